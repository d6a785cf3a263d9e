use crate::database::{DatabaseConnection, DependOnDatabaseConnection};
use crate::entity::{CurrentLoans, FineAmount, User, UserId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait UserModifier: 'static + Sync + Send {
    type Connection: 'static + Send;
    async fn create(
        &self,
        con: &mut Self::Connection,
        user: &User,
    ) -> error_stack::Result<(), KernelError>;

    /// Guarded on `loan_limit`: `Precondition(LoanLimitExceeded)` when full.
    async fn increment_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<(), KernelError>;

    /// Clamped at zero.
    async fn decrement_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<bool, KernelError>;

    /// Compare-and-set against `recorded`; `Conflict` when the counter moved since it was read.
    async fn restore_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        recorded: &CurrentLoans,
        current: &CurrentLoans,
    ) -> error_stack::Result<(), KernelError>;

    async fn restore_fines(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        recorded: &FineAmount,
        total: &FineAmount,
    ) -> error_stack::Result<(), KernelError>;

    async fn add_fine(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        amount: &FineAmount,
    ) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnUserModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type UserModifier: UserModifier<
        Connection = <Self::DatabaseConnection as DatabaseConnection>::Connection,
    >;
    fn user_modifier(&self) -> &Self::UserModifier;
}
