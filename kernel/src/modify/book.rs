use crate::database::{DatabaseConnection, DependOnDatabaseConnection};
use crate::entity::{AvailableCopies, Book, BookId};
use crate::KernelError;

/// The availability ledger. Each call is one atomic read-modify-write on the book record
/// and the counter never leaves `[0, total_copies]`.
#[async_trait::async_trait]
pub trait BookModifier: 'static + Sync + Send {
    type Connection: 'static + Send;
    async fn create(
        &self,
        con: &mut Self::Connection,
        book: &Book,
    ) -> error_stack::Result<(), KernelError>;

    /// Fails with `NotFound`, or `Precondition(Unavailable)` when no copy is on the shelf.
    async fn decrement_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Book, KernelError>;

    /// Clamped at `total_copies`; `Ok(false)` when the counter was already full.
    async fn increment_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError>;

    /// Compare-and-set against `recorded`; `Conflict` when the counter moved since it was read.
    async fn restore_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
        recorded: &AvailableCopies,
        available: &AvailableCopies,
    ) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnBookModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type BookModifier: BookModifier<
        Connection = <Self::DatabaseConnection as DatabaseConnection>::Connection,
    >;
    fn book_modifier(&self) -> &Self::BookModifier;
}
