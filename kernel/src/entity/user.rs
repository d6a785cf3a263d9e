mod id;
mod loans;
mod name;

pub use self::{id::*, loans::*, name::*};
use crate::entity::FineAmount;
use crate::{KernelError, Precondition};
use destructure::{Destructure, Mutation};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use vodca::References;

/// The borrowing side of an account. `0 <= current_loans <= loan_limit` always holds.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure, Mutation)]
pub struct User {
    id: UserId,
    name: UserName,
    loan_limit: LoanLimit,
    current_loans: CurrentLoans,
    active: AccountActive,
    total_fines: FineAmount,
}

impl User {
    pub fn new(
        id: UserId,
        name: UserName,
        loan_limit: LoanLimit,
        current_loans: CurrentLoans,
        active: AccountActive,
        total_fines: FineAmount,
    ) -> Self {
        let current = (*current_loans.as_ref()).clamp(0, *loan_limit.as_ref());
        Self {
            id,
            name,
            loan_limit,
            current_loans: CurrentLoans::new(current),
            active,
            total_fines,
        }
    }

    pub fn register(id: UserId, name: UserName) -> Self {
        Self::new(
            id,
            name,
            LoanLimit::default(),
            CurrentLoans::default(),
            AccountActive::new(true),
            FineAmount::zero(),
        )
    }

    pub fn ensure_can_borrow(&self) -> error_stack::Result<(), KernelError> {
        if !*self.active.as_ref() {
            return Err(Report::new(KernelError::from(Precondition::AccountInactive))
                .attach_printable(format!("user {:?} is inactive", self.id)));
        }
        if self.current_loans.as_ref() >= self.loan_limit.as_ref() {
            return Err(Report::new(KernelError::from(Precondition::LoanLimitExceeded))
                .attach_printable(format!(
                    "user {:?} holds {} of {} loans",
                    self.id,
                    self.current_loans.as_ref(),
                    self.loan_limit.as_ref()
                )));
        }
        Ok(())
    }

    /// Guarded on the limit only; an inactive account keeps loans it already has.
    pub fn increment_loans(&mut self) -> error_stack::Result<(), KernelError> {
        let current = *self.current_loans.as_ref();
        if current >= *self.loan_limit.as_ref() {
            return Err(Report::new(KernelError::from(Precondition::LoanLimitExceeded)));
        }
        self.substitute(|user| *user.current_loans = CurrentLoans::new(current + 1));
        Ok(())
    }

    /// Clamped at zero; returns whether the counter moved.
    pub fn decrement_loans(&mut self) -> bool {
        let current = *self.current_loans.as_ref();
        if current <= 0 {
            return false;
        }
        self.substitute(|user| *user.current_loans = CurrentLoans::new(current - 1));
        true
    }

    /// Reconciliation only. `Conflict` when the counter moved away from `recorded`.
    pub fn restore_loans(
        &mut self,
        recorded: CurrentLoans,
        count: CurrentLoans,
    ) -> error_stack::Result<(), KernelError> {
        if self.current_loans != recorded {
            return Err(self.moved("current loans"));
        }
        let count = (*count.as_ref()).clamp(0, *self.loan_limit.as_ref());
        self.substitute(|user| *user.current_loans = CurrentLoans::new(count));
        Ok(())
    }

    /// Reconciliation only. `Conflict` when the total moved away from `recorded`.
    pub fn restore_fines(
        &mut self,
        recorded: FineAmount,
        total: FineAmount,
    ) -> error_stack::Result<(), KernelError> {
        if self.total_fines != recorded {
            return Err(self.moved("total fines"));
        }
        self.substitute(|user| *user.total_fines = total);
        Ok(())
    }

    fn moved(&self, counter: &str) -> Report<KernelError> {
        Report::new(KernelError::Conflict)
            .attach_printable(format!("{counter} of user {:?} moved during reconciliation", self.id))
    }

    pub fn add_fine(&mut self, amount: FineAmount) {
        let total = self.total_fines.add(amount);
        self.substitute(|user| *user.total_fines = total);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use uuid::Uuid;

    fn user(limit: i32, current: i32, active: bool) -> User {
        User::new(
            UserId::new(Uuid::new_v4()),
            UserName::new("Ursula"),
            LoanLimit::new(limit),
            CurrentLoans::new(current),
            AccountActive::new(active),
            FineAmount::zero(),
        )
    }

    #[test]
    fn borrowing_needs_an_active_account_under_the_limit() {
        assert!(user(5, 0, true).ensure_can_borrow().is_ok());

        let report = user(1, 1, true).ensure_can_borrow().unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::LoanLimitExceeded)
        );
        let report = user(1, 1, false).ensure_can_borrow().unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::AccountInactive)
        );
    }

    #[test]
    fn loan_counter_stays_in_bounds() {
        let mut user = user(1, 0, true);
        assert!(user.increment_loans().is_ok());
        assert!(user.increment_loans().is_err());
        assert_eq!(*user.current_loans().as_ref(), 1);

        assert!(user.decrement_loans());
        assert!(!user.decrement_loans());
        assert_eq!(*user.current_loans().as_ref(), 0);
    }

    #[test]
    fn fines_accumulate() {
        let mut user = user(5, 0, true);
        user.add_fine(FineAmount::new(3));
        user.add_fine(FineAmount::new(2));
        assert_eq!(user.total_fines(), &FineAmount::new(5));
    }

    #[test]
    fn restores_are_compare_and_set() {
        let mut user = user(5, 2, true);
        user.restore_loans(CurrentLoans::new(2), CurrentLoans::new(1))
            .unwrap();
        assert_eq!(*user.current_loans().as_ref(), 1);

        let report = user
            .restore_loans(CurrentLoans::new(2), CurrentLoans::new(0))
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);
        assert_eq!(*user.current_loans().as_ref(), 1);

        user.add_fine(FineAmount::new(4));
        user.add_fine(FineAmount::new(4));
        let report = user
            .restore_fines(FineAmount::new(4), FineAmount::new(4))
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);
        user.restore_fines(FineAmount::new(8), FineAmount::new(4))
            .unwrap();
        assert_eq!(user.total_fines(), &FineAmount::new(4));
    }
}
