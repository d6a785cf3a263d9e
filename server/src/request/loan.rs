use crate::controller::Intake;
use application::transfer::{ConfirmPickupDto, ReturnLoanDto};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ConfirmPickupRequest {
    pickup_code: String,
}

#[derive(Debug)]
pub struct ReturnLoanRequest {
    loan_id: Uuid,
}

impl ReturnLoanRequest {
    pub fn new(loan_id: Uuid) -> Self {
        Self { loan_id }
    }
}

pub struct LoanTransformer;

impl Intake<ConfirmPickupRequest> for LoanTransformer {
    type To = ConfirmPickupDto;
    fn emit(&self, input: ConfirmPickupRequest) -> Self::To {
        ConfirmPickupDto {
            pickup_code: input.pickup_code,
        }
    }
}

impl Intake<ReturnLoanRequest> for LoanTransformer {
    type To = ReturnLoanDto;
    fn emit(&self, input: ReturnLoanRequest) -> Self::To {
        ReturnLoanDto {
            loan_id: input.loan_id,
        }
    }
}
