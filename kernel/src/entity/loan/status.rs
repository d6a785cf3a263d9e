use crate::KernelError;
use error_stack::Report;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    PendingPickup,
    Active,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::PendingPickup => "pending_pickup",
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
        }
    }

    pub fn parse(raw: &str) -> error_stack::Result<Self, KernelError> {
        match raw {
            "pending_pickup" => Ok(LoanStatus::PendingPickup),
            "active" => Ok(LoanStatus::Active),
            "returned" => Ok(LoanStatus::Returned),
            other => Err(Report::new(KernelError::Internal)
                .attach_printable(format!("unknown loan status {other:?}"))),
        }
    }

    /// The loan still holds a copy: either awaiting pickup or out with the borrower.
    pub fn is_outstanding(&self) -> bool {
        matches!(self, LoanStatus::PendingPickup | LoanStatus::Active)
    }
}
