use kernel::interface::job::PendingUpdate;
use kernel::prelude::entity::{DestructLoan, Loan};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::transfer::ReleaseOutcome;

#[derive(Debug, Clone)]
pub struct LoanDto {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub book_title: String,
    pub user_name: String,
    pub pickup_code: String,
    pub status: String,
    pub loaned_at: OffsetDateTime,
    pub due_date: Option<OffsetDateTime>,
    pub returned_at: Option<OffsetDateTime>,
    pub fine: i64,
    pub days_until_due: i64,
}

impl LoanDto {
    pub fn new(loan: Loan, now: OffsetDateTime) -> Self {
        let days_until_due = loan.days_until_due(now);
        let DestructLoan {
            id,
            book_id,
            user_id,
            book_title,
            user_name,
            pickup_code,
            status,
            loaned_at,
            due_date,
            returned_at,
            fine,
        } = loan.into_destruct();
        Self {
            id: id.into(),
            book_id: book_id.into(),
            user_id: user_id.into(),
            book_title: book_title.into(),
            user_name: user_name.into(),
            pickup_code: pickup_code.into(),
            status: status.as_str().to_string(),
            loaned_at: *loaned_at.as_ref(),
            due_date: due_date.map(Into::into),
            returned_at: returned_at.map(Into::into),
            fine: fine.into(),
            days_until_due,
        }
    }
}

/// A committed loan plus whatever secondary updates were parked for later.
#[derive(Debug, Clone)]
pub struct BorrowResultDto {
    pub loan: LoanDto,
    pub deferred: Vec<PendingUpdate>,
}

impl BorrowResultDto {
    pub fn is_degraded(&self) -> bool {
        !self.deferred.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ReturnResultDto {
    pub loan: LoanDto,
    pub fine: i64,
    pub release: ReleaseOutcome,
    pub deferred: Vec<PendingUpdate>,
}

pub struct BorrowDto {
    pub book_id: Uuid,
    pub user_id: Uuid,
}

pub struct ConfirmPickupDto {
    pub pickup_code: String,
}

pub struct ReturnLoanDto {
    pub loan_id: Uuid,
}

pub struct GetUserLoansDto {
    pub user_id: Uuid,
}
