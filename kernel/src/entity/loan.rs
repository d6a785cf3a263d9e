mod dates;
mod id;
mod pickup_code;
mod status;

pub use self::{dates::*, id::*, pickup_code::*, status::*};
use crate::entity::{
    whole_days_between, Book, BookId, BookTitle, CreatedAt, FineAmount, User, UserId, UserName,
};
use crate::KernelError;
use destructure::{Destructure, Mutation};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use vodca::References;

/// One borrowing of one copy. `pending_pickup -> active -> returned`, never backwards.
/// `due_date` is unset until pickup: the loan term starts at the desk.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure, Mutation)]
pub struct Loan {
    id: LoanId,
    book_id: BookId,
    user_id: UserId,
    book_title: BookTitle,
    user_name: UserName,
    pickup_code: PickupCode,
    status: LoanStatus,
    loaned_at: CreatedAt<Loan>,
    due_date: Option<DueDate>,
    returned_at: Option<ReturnedAt>,
    fine: FineAmount,
}

impl Loan {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: LoanId,
        book_id: BookId,
        user_id: UserId,
        book_title: BookTitle,
        user_name: UserName,
        pickup_code: PickupCode,
        status: LoanStatus,
        loaned_at: CreatedAt<Loan>,
        due_date: Option<DueDate>,
        returned_at: Option<ReturnedAt>,
        fine: FineAmount,
    ) -> Self {
        Self {
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
        }
    }

    /// A loan waiting for pickup. Counters are left alone; the caller has already checked
    /// that the user may borrow and decides how the copy is accounted for.
    pub fn open(id: LoanId, book: &Book, user: &User, code: PickupCode, now: OffsetDateTime) -> Self {
        Self::new(
            id,
            book.id().clone(),
            user.id().clone(),
            book.title().clone(),
            user.name().clone(),
            code,
            LoanStatus::PendingPickup,
            CreatedAt::new(now),
            None,
            None,
            FineAmount::zero(),
        )
    }

    pub fn confirm_pickup(
        &mut self,
        now: OffsetDateTime,
        term: Duration,
    ) -> error_stack::Result<(), KernelError> {
        if self.status != LoanStatus::PendingPickup {
            return Err(Report::new(KernelError::Conflict)
                .attach_printable(format!("loan {:?} is already {}", self.id, self.status.as_str())));
        }
        self.substitute(|loan| {
            *loan.status = LoanStatus::Active;
            *loan.due_date = Some(DueDate::new(now + term));
        });
        Ok(())
    }

    /// Closes the loan and records the fine owed for the overdue period.
    pub fn return_at(
        &mut self,
        now: OffsetDateTime,
        fine_per_day: FineAmount,
    ) -> error_stack::Result<FineAmount, KernelError> {
        if self.status != LoanStatus::Active {
            return Err(Report::new(KernelError::from(crate::Precondition::LoanNotActive))
                .attach_printable(format!("loan {:?} is {}", self.id, self.status.as_str())));
        }
        let fine = self.fine_at(now, fine_per_day);
        self.substitute(|loan| {
            *loan.status = LoanStatus::Returned;
            *loan.returned_at = Some(ReturnedAt::new(now));
            *loan.fine = fine;
        });
        Ok(fine)
    }

    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        match (&self.status, &self.due_date) {
            (LoanStatus::Active, Some(due)) => now > *due.as_ref(),
            _ => false,
        }
    }

    /// Fine accrued so far: one `fine_per_day` for each full day past the due date.
    pub fn fine_at(&self, now: OffsetDateTime, fine_per_day: FineAmount) -> FineAmount {
        let Some(due) = self.due_date.as_ref().filter(|_| self.is_overdue(now)) else {
            return FineAmount::zero();
        };
        let days = whole_days_between(*due.as_ref(), now);
        FineAmount::new(days.saturating_mul(*fine_per_day.as_ref()))
    }

    pub fn days_until_due(&self, now: OffsetDateTime) -> i64 {
        match (&self.status, &self.due_date) {
            (LoanStatus::Active, Some(due)) => whole_days_between(now, *due.as_ref()),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::{AvailableCopies, TotalCopies};
    use crate::Precondition;
    use time::macros::datetime;
    use uuid::Uuid;

    fn loan(now: OffsetDateTime) -> Loan {
        let book = Book::new(
            BookId::new(Uuid::new_v4()),
            BookTitle::new("Dune"),
            TotalCopies::new(1),
            AvailableCopies::new(1),
        );
        let user = User::register(UserId::new(Uuid::new_v4()), UserName::new("Paul"));
        Loan::open(
            LoanId::new(Uuid::new_v4()),
            &book,
            &user,
            PickupCode::parse("ABC123").unwrap(),
            now,
        )
    }

    #[test]
    fn pickup_starts_the_term() {
        let now = datetime!(2024-03-01 10:00 UTC);
        let mut loan = loan(now);
        assert_eq!(loan.due_date(), &None);

        loan.confirm_pickup(now, Duration::days(14)).unwrap();
        assert_eq!(loan.status(), &LoanStatus::Active);
        assert_eq!(
            loan.due_date(),
            &Some(DueDate::new(datetime!(2024-03-15 10:00 UTC)))
        );

        let report = loan.confirm_pickup(now, Duration::days(14)).unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);
    }

    #[test]
    fn return_charges_whole_overdue_days() {
        let start = datetime!(2024-03-01 10:00 UTC);
        let mut loan = loan(start);
        loan.confirm_pickup(start, Duration::days(14)).unwrap();

        let due = datetime!(2024-03-15 10:00 UTC);
        assert_eq!(loan.fine_at(due, FineAmount::new(1)), FineAmount::zero());
        assert_eq!(
            loan.fine_at(due + Duration::hours(47), FineAmount::new(1)),
            FineAmount::new(1)
        );

        let fine = loan
            .return_at(due + Duration::days(5), FineAmount::new(1))
            .unwrap();
        assert_eq!(fine, FineAmount::new(5));
        assert_eq!(loan.fine(), &FineAmount::new(5));
        assert_eq!(loan.status(), &LoanStatus::Returned);
        assert!(!loan.is_overdue(due + Duration::days(6)));
    }

    #[test]
    fn only_active_loans_return() {
        let now = datetime!(2024-03-01 10:00 UTC);
        let mut loan = loan(now);
        let report = loan.return_at(now, FineAmount::new(1)).unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::LoanNotActive)
        );
    }

    #[test]
    fn days_until_due_counts_down() {
        let now = datetime!(2024-03-01 10:00 UTC);
        let mut loan = loan(now);
        assert_eq!(loan.days_until_due(now), 0);
        loan.confirm_pickup(now, Duration::days(14)).unwrap();
        assert_eq!(loan.days_until_due(now + Duration::hours(12)), 13);
        assert!(loan.is_overdue(now + Duration::days(15)));
    }
}
