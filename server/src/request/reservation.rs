use crate::controller::Intake;
use crate::request::CallerRequest;
use application::transfer::{BorrowFromReservationDto, CancelReservationDto};
use uuid::Uuid;

/// `DELETE /reservations/:id?user_id=` carries the caller in the query string.
#[derive(Debug)]
pub struct CancelReservationRequest {
    reservation_id: Uuid,
    user_id: Uuid,
}

impl CancelReservationRequest {
    pub fn new(reservation_id: Uuid, caller: CallerRequest) -> Self {
        Self {
            reservation_id,
            user_id: caller.user_id,
        }
    }
}

pub struct ReservationTransformer;

impl Intake<(Uuid, CallerRequest)> for ReservationTransformer {
    type To = BorrowFromReservationDto;
    fn emit(
        &self,
        (reservation_id, CallerRequest { user_id }): (Uuid, CallerRequest),
    ) -> Self::To {
        BorrowFromReservationDto {
            reservation_id,
            user_id,
        }
    }
}

impl Intake<CancelReservationRequest> for ReservationTransformer {
    type To = CancelReservationDto;
    fn emit(&self, input: CancelReservationRequest) -> Self::To {
        CancelReservationDto {
            reservation_id: input.reservation_id,
            user_id: input.user_id,
        }
    }
}
