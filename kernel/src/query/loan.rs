use crate::database::{DatabaseConnection, DependOnDatabaseConnection};
use crate::entity::{BookId, Loan, LoanId, LoanStatus, PickupCode, UserId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait LoanQuery: 'static + Sync + Send {
    type Connection: 'static + Send;
    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &LoanId,
    ) -> error_stack::Result<Option<Loan>, KernelError>;

    /// Codes repeat over time; the status narrows the match to the loan the code currently means.
    async fn find_by_pickup_code(
        &self,
        con: &mut Self::Connection,
        code: &PickupCode,
        status: &LoanStatus,
    ) -> error_stack::Result<Option<Loan>, KernelError>;

    async fn find_by_book_id(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError>;

    async fn find_by_user_id(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<Loan>, KernelError>;

    async fn find_by_status(
        &self,
        con: &mut Self::Connection,
        status: &LoanStatus,
    ) -> error_stack::Result<Vec<Loan>, KernelError>;
}

pub trait DependOnLoanQuery: 'static + Sync + Send + DependOnDatabaseConnection {
    type LoanQuery: LoanQuery<
        Connection = <Self::DatabaseConnection as DatabaseConnection>::Connection,
    >;
    fn loan_query(&self) -> &Self::LoanQuery;
}
