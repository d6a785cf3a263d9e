use error_stack::Report;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use kernel::interface::query::BookQuery;
use kernel::interface::update::BookModifier;
use kernel::prelude::entity::{AvailableCopies, Book, BookId, BookTitle, TotalCopies};
use kernel::{KernelError, Precondition};

use crate::database::postgres::{exists, moved_or_missing};
use crate::error::ConvertError;

pub struct PostgresBookRepository;

#[async_trait::async_trait]
impl BookQuery for PostgresBookRepository {
    type Connection = PoolConnection<Postgres>;
    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        PgBookInternal::find_by_id(con, id).await
    }
}

#[async_trait::async_trait]
impl BookModifier for PostgresBookRepository {
    type Connection = PoolConnection<Postgres>;

    async fn create(
        &self,
        con: &mut Self::Connection,
        book: &Book,
    ) -> error_stack::Result<(), KernelError> {
        PgBookInternal::create(con, book).await
    }

    async fn decrement_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Book, KernelError> {
        PgBookInternal::decrement_available(con, book_id).await
    }

    async fn increment_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        PgBookInternal::increment_available(con, book_id).await
    }

    async fn restore_available(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
        recorded: &AvailableCopies,
        available: &AvailableCopies,
    ) -> error_stack::Result<(), KernelError> {
        PgBookInternal::restore_available(con, book_id, recorded, available).await
    }
}

#[derive(sqlx::FromRow)]
struct BookRow {
    id: Uuid,
    title: String,
    total_copies: i32,
    available_copies: i32,
}

impl From<BookRow> for Book {
    fn from(value: BookRow) -> Self {
        Book::new(
            BookId::new(value.id),
            BookTitle::new(value.title),
            TotalCopies::new(value.total_copies),
            AvailableCopies::new(value.available_copies),
        )
    }
}

fn not_found(id: &BookId) -> Report<KernelError> {
    Report::new(KernelError::NotFound).attach_printable(format!("book {id:?} not found"))
}

pub(in crate::database) struct PgBookInternal;

impl PgBookInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &BookId,
    ) -> error_stack::Result<Option<Book>, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            SELECT id, title, total_copies, available_copies
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(Book::from))
    }

    async fn create(con: &mut PgConnection, book: &Book) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            INSERT INTO books (id, title, total_copies, available_copies)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(book.id().as_ref())
        .bind(book.title().as_ref())
        .bind(book.total_copies().as_ref())
        .bind(book.available_copies().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn decrement_available(
        con: &mut PgConnection,
        id: &BookId,
    ) -> error_stack::Result<Book, KernelError> {
        let row = sqlx::query_as::<_, BookRow>(
            // language=postgresql
            r#"
            UPDATE books
            SET available_copies = available_copies - 1
            WHERE id = $1 AND available_copies > 0
            RETURNING id, title, total_copies, available_copies
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(&mut *con)
        .await
        .convert_error()?;
        match row {
            Some(row) => Ok(Book::from(row)),
            None if exists(con, "books", id.as_ref()).await? => {
                Err(Report::new(KernelError::from(Precondition::Unavailable)))
            }
            None => Err(not_found(id)),
        }
    }

    async fn increment_available(
        con: &mut PgConnection,
        id: &BookId,
    ) -> error_stack::Result<bool, KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1
            WHERE id = $1 AND available_copies < total_copies
            "#,
        )
        .bind(id.as_ref())
        .execute(&mut *con)
        .await
        .convert_error()?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if exists(con, "books", id.as_ref()).await? {
            Ok(false)
        } else {
            Err(not_found(id))
        }
    }

    async fn restore_available(
        con: &mut PgConnection,
        id: &BookId,
        recorded: &AvailableCopies,
        available: &AvailableCopies,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = LEAST(GREATEST($3, 0), total_copies)
            WHERE id = $1 AND available_copies = $2
            "#,
        )
        .bind(id.as_ref())
        .bind(recorded.as_ref())
        .bind(available.as_ref())
        .execute(&mut *con)
        .await
        .convert_error()?;
        if result.rows_affected() == 0 {
            return Err(moved_or_missing(con, "books", id.as_ref(), "available_copies").await);
        }
        Ok(())
    }
}
