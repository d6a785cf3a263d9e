use crate::database::{DatabaseConnection, DependOnDatabaseConnection};
use crate::entity::{Loan, LoanStatus};
use crate::KernelError;

#[async_trait::async_trait]
pub trait LoanModifier: 'static + Sync + Send {
    type Connection: 'static + Send;
    async fn create(
        &self,
        con: &mut Self::Connection,
        loan: &Loan,
    ) -> error_stack::Result<(), KernelError>;

    /// Writes `loan` only if the stored record is still in `expected`; otherwise `Conflict`.
    async fn update(
        &self,
        con: &mut Self::Connection,
        loan: &Loan,
        expected: &LoanStatus,
    ) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnLoanModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type LoanModifier: LoanModifier<
        Connection = <Self::DatabaseConnection as DatabaseConnection>::Connection,
    >;
    fn loan_modifier(&self) -> &Self::LoanModifier;
}
