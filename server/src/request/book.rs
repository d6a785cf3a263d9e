use crate::controller::Intake;
use application::transfer::{
    BorrowDto, ExpireReservationsDto, ReconcileBookDto, ReserveDto,
};
use serde::Deserialize;
use uuid::Uuid;

/// The caller names itself; there is no authentication in front of this.
#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    pub user_id: Uuid,
}

#[derive(Debug)]
pub struct ExpireReservationsRequest {
    book_id: Uuid,
}

impl ExpireReservationsRequest {
    pub fn new(book_id: Uuid) -> Self {
        Self { book_id }
    }
}

#[derive(Debug)]
pub struct ReconcileBookRequest {
    book_id: Uuid,
}

impl ReconcileBookRequest {
    pub fn new(book_id: Uuid) -> Self {
        Self { book_id }
    }
}

pub struct BookTransformer;

impl Intake<(Uuid, CallerRequest)> for BookTransformer {
    type To = BorrowDto;
    fn emit(&self, (book_id, CallerRequest { user_id }): (Uuid, CallerRequest)) -> Self::To {
        BorrowDto { book_id, user_id }
    }
}

impl Intake<ExpireReservationsRequest> for BookTransformer {
    type To = ExpireReservationsDto;
    fn emit(&self, input: ExpireReservationsRequest) -> Self::To {
        ExpireReservationsDto {
            book_id: input.book_id,
        }
    }
}

impl Intake<ReconcileBookRequest> for BookTransformer {
    type To = ReconcileBookDto;
    fn emit(&self, input: ReconcileBookRequest) -> Self::To {
        ReconcileBookDto {
            book_id: input.book_id,
        }
    }
}

/// Reserving goes through the book's URL but lands in the reservation workflow.
pub struct ReserveTransformer;

impl Intake<(Uuid, CallerRequest)> for ReserveTransformer {
    type To = ReserveDto;
    fn emit(&self, (book_id, CallerRequest { user_id }): (Uuid, CallerRequest)) -> Self::To {
        ReserveDto { book_id, user_id }
    }
}
