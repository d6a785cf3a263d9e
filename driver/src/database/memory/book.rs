use error_stack::Report;
use kernel::interface::query::BookQuery;
use kernel::interface::update::BookModifier;
use kernel::prelude::entity::{AvailableCopies, Book, BookId};
use kernel::KernelError;

use crate::database::memory::{InMemoryConnection, StoreOperation};

fn not_found(id: &BookId) -> Report<KernelError> {
    Report::new(KernelError::NotFound).attach_printable(format!("book {id:?} not found"))
}

pub struct InMemoryBookRepository;

#[async_trait::async_trait]
impl BookQuery for InMemoryBookRepository {
    type Connection = InMemoryConnection;
    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindBook)?;
        Ok(store.books.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl BookModifier for InMemoryBookRepository {
    type Connection = InMemoryConnection;

    async fn create(
        &self,
        con: &mut Self::Connection,
        book: &Book,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::CreateBook)?;
        store.books.insert(book.id().clone(), book.clone());
        Ok(())
    }

    async fn decrement_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Book, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::DecrementAvailable)?;
        let book = store
            .books
            .get_mut(book_id)
            .ok_or_else(|| not_found(book_id))?;
        book.decrement()?;
        Ok(book.clone())
    }

    async fn increment_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::IncrementAvailable)?;
        let book = store
            .books
            .get_mut(book_id)
            .ok_or_else(|| not_found(book_id))?;
        Ok(book.increment())
    }

    async fn restore_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
        recorded: &AvailableCopies,
        available: &AvailableCopies,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::RestoreAvailable)?;
        store
            .books
            .get_mut(book_id)
            .ok_or_else(|| not_found(book_id))?
            .restore(*recorded, *available)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::InMemoryDatabase;
    use kernel::interface::database::DatabaseConnection;
    use kernel::prelude::entity::{BookTitle, TotalCopies};
    use uuid::Uuid;

    #[tokio::test]
    async fn restore_loses_to_a_release_in_between() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let mut con = db.acquire().await?;
        let id = BookId::new(Uuid::new_v4());
        let book = Book::new(
            id.clone(),
            BookTitle::new("Roadside Picnic"),
            TotalCopies::new(1),
            AvailableCopies::new(0),
        );
        InMemoryBookRepository.create(&mut con, &book).await?;

        let read = InMemoryBookRepository
            .find_by_id(&mut con, &id)
            .await?
            .ok_or_else(|| Report::new(KernelError::NotFound))?;
        assert!(InMemoryBookRepository.increment_available(&mut con, &id).await?);

        let report = InMemoryBookRepository
            .restore_available(&mut con, &id, read.available_copies(), &AvailableCopies::new(0))
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);
        let stored = db.book(&id).await.map(|book| *book.available_copies().as_ref());
        assert_eq!(stored, Some(1));
        Ok(())
    }
}
