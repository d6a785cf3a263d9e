use std::fmt::{Display, Formatter};

use error_stack::Context;

/// Reasons a workflow refuses to run against the current state of a record.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Precondition {
    Unavailable,
    LoanLimitExceeded,
    AccountInactive,
    LoanNotActive,
    ReservationNotReady,
    ReservationExpired,
    DuplicateReservation,
    ReservationAlreadyCompleted,
    ReservationWrongState,
}

impl Display for Precondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Precondition::Unavailable => write!(f, "No copy of the book is available"),
            Precondition::LoanLimitExceeded => write!(f, "Loan limit reached"),
            Precondition::AccountInactive => write!(f, "Account is inactive"),
            Precondition::LoanNotActive => write!(f, "Loan is not active"),
            Precondition::ReservationNotReady => write!(f, "Reservation is not ready"),
            Precondition::ReservationExpired => write!(f, "Reservation has expired"),
            Precondition::DuplicateReservation => {
                write!(f, "An active reservation for this book already exists")
            }
            Precondition::ReservationAlreadyCompleted => {
                write!(f, "Reservation is already completed")
            }
            Precondition::ReservationWrongState => {
                write!(f, "Reservation is not in the expected state")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    Validation,
    NotFound,
    Precondition(Precondition),
    Forbidden,
    Conflict,
    StoreUnavailable,
    Internal,
}

impl KernelError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, KernelError::Conflict)
    }
}

impl Display for KernelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            KernelError::Validation => write!(f, "Malformed or missing identifier"),
            KernelError::NotFound => write!(f, "Record not found"),
            KernelError::Precondition(reason) => write!(f, "Precondition failed: {reason}"),
            KernelError::Forbidden => write!(f, "Record is not owned by the caller"),
            KernelError::Conflict => write!(f, "Concurrency error"),
            KernelError::StoreUnavailable => write!(f, "Store is unavailable"),
            KernelError::Internal => write!(f, "Internal kernel error"),
        }
    }
}

impl Context for KernelError {}

impl From<Precondition> for KernelError {
    fn from(value: Precondition) -> Self {
        KernelError::Precondition(value)
    }
}
