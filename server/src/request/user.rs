use crate::controller::Intake;
use application::transfer::{GetUserLoansDto, GetUserReservationsDto, ReconcileUserDto};
use uuid::Uuid;

#[derive(Debug)]
pub struct GetUserLoansRequest {
    user_id: Uuid,
}

impl GetUserLoansRequest {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

#[derive(Debug)]
pub struct GetUserReservationsRequest {
    user_id: Uuid,
}

impl GetUserReservationsRequest {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

#[derive(Debug)]
pub struct ReconcileUserRequest {
    user_id: Uuid,
}

impl ReconcileUserRequest {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

pub struct UserTransformer;

impl Intake<GetUserLoansRequest> for UserTransformer {
    type To = GetUserLoansDto;
    fn emit(&self, input: GetUserLoansRequest) -> Self::To {
        GetUserLoansDto {
            user_id: input.user_id,
        }
    }
}

impl Intake<GetUserReservationsRequest> for UserTransformer {
    type To = GetUserReservationsDto;
    fn emit(&self, input: GetUserReservationsRequest) -> Self::To {
        GetUserReservationsDto {
            user_id: input.user_id,
        }
    }
}

impl Intake<ReconcileUserRequest> for UserTransformer {
    type To = ReconcileUserDto;
    fn emit(&self, input: ReconcileUserRequest) -> Self::To {
        ReconcileUserDto {
            user_id: input.user_id,
        }
    }
}
