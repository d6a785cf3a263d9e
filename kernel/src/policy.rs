use crate::entity::FineAmount;
use time::Duration;
use vodca::References;

/// Lending terms shared by every workflow.
#[derive(Debug, Clone, References)]
pub struct LendingPolicy {
    loan_term: Duration,
    ready_window: Duration,
    reservation_hold: Duration,
    fine_per_day: FineAmount,
}

impl LendingPolicy {
    pub fn new(
        loan_term: Duration,
        ready_window: Duration,
        reservation_hold: Duration,
        fine_per_day: FineAmount,
    ) -> Self {
        Self {
            loan_term,
            ready_window,
            reservation_hold,
            fine_per_day,
        }
    }
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self::new(
            Duration::days(14),
            Duration::days(3),
            Duration::days(7),
            FineAmount::new(1),
        )
    }
}

pub trait DependOnLendingPolicy: 'static + Sync + Send {
    fn lending_policy(&self) -> &LendingPolicy;
}
