use error_stack::Report;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use kernel::interface::query::LoanQuery;
use kernel::interface::update::LoanModifier;
use kernel::prelude::entity::{
    BookId, BookTitle, CreatedAt, DueDate, FineAmount, Loan, LoanId, LoanStatus, PickupCode,
    ReturnedAt, UserId, UserName,
};
use kernel::KernelError;

use crate::error::ConvertError;

pub struct PostgresLoanRepository;

#[async_trait::async_trait]
impl LoanQuery for PostgresLoanRepository {
    type Connection = PoolConnection<Postgres>;

    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &LoanId,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        PgLoanInternal::find_by_id(con, id).await
    }

    async fn find_by_pickup_code(
        &self,
        con: &mut Self::Connection,
        code: &PickupCode,
        status: &LoanStatus,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        PgLoanInternal::find_by_pickup_code(con, code, status).await
    }

    async fn find_by_book_id(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        PgLoanInternal::find_by_book_id(con, book_id).await
    }

    async fn find_by_user_id(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        PgLoanInternal::find_by_user_id(con, user_id).await
    }

    async fn find_by_status(
        &self,
        con: &mut Self::Connection,
        status: &LoanStatus,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        PgLoanInternal::find_by_status(con, status).await
    }
}

#[async_trait::async_trait]
impl LoanModifier for PostgresLoanRepository {
    type Connection = PoolConnection<Postgres>;

    async fn create(
        &self,
        con: &mut Self::Connection,
        loan: &Loan,
    ) -> error_stack::Result<(), KernelError> {
        PgLoanInternal::create(con, loan).await
    }

    async fn update(
        &self,
        con: &mut Self::Connection,
        loan: &Loan,
        expected: &LoanStatus,
    ) -> error_stack::Result<(), KernelError> {
        PgLoanInternal::update(con, loan, expected).await
    }
}

#[derive(sqlx::FromRow)]
struct LoanRow {
    id: Uuid,
    book_id: Uuid,
    user_id: Uuid,
    book_title: String,
    user_name: String,
    pickup_code: String,
    status: String,
    loaned_at: OffsetDateTime,
    due_date: Option<OffsetDateTime>,
    returned_at: Option<OffsetDateTime>,
    fine: i64,
}

impl TryFrom<LoanRow> for Loan {
    type Error = Report<KernelError>;
    fn try_from(value: LoanRow) -> Result<Self, Self::Error> {
        Ok(Loan::new(
            LoanId::new(value.id),
            BookId::new(value.book_id),
            UserId::new(value.user_id),
            BookTitle::new(value.book_title),
            UserName::new(value.user_name),
            PickupCode::parse(value.pickup_code)?,
            LoanStatus::parse(&value.status)?,
            CreatedAt::new(value.loaned_at),
            value.due_date.map(DueDate::new),
            value.returned_at.map(ReturnedAt::new),
            FineAmount::new(value.fine),
        ))
    }
}

fn collect(rows: Vec<LoanRow>) -> error_stack::Result<Vec<Loan>, KernelError> {
    rows.into_iter().map(Loan::try_from).collect()
}

pub(in crate::database) struct PgLoanInternal;

impl PgLoanInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &LoanId,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        let row = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, pickup_code, status,
                   loaned_at, due_date, returned_at, fine
            FROM loans
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(Loan::try_from).transpose()
    }

    async fn find_by_pickup_code(
        con: &mut PgConnection,
        code: &PickupCode,
        status: &LoanStatus,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        let row = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, pickup_code, status,
                   loaned_at, due_date, returned_at, fine
            FROM loans
            WHERE pickup_code = $1 AND status = $2
            ORDER BY loaned_at DESC
            LIMIT 1
            "#,
        )
        .bind(code.as_ref())
        .bind(status.as_str())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(Loan::try_from).transpose()
    }

    async fn find_by_book_id(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        let rows = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, pickup_code, status,
                   loaned_at, due_date, returned_at, fine
            FROM loans
            WHERE book_id = $1
            "#,
        )
        .bind(book_id.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        collect(rows)
    }

    async fn find_by_user_id(
        con: &mut PgConnection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        let rows = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, pickup_code, status,
                   loaned_at, due_date, returned_at, fine
            FROM loans
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        collect(rows)
    }

    async fn find_by_status(
        con: &mut PgConnection,
        status: &LoanStatus,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        let rows = sqlx::query_as::<_, LoanRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, pickup_code, status,
                   loaned_at, due_date, returned_at, fine
            FROM loans
            WHERE status = $1
            "#,
        )
        .bind(status.as_str())
        .fetch_all(con)
        .await
        .convert_error()?;
        collect(rows)
    }

    async fn create(con: &mut PgConnection, loan: &Loan) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            INSERT INTO loans (id, book_id, user_id, book_title, user_name, pickup_code, status,
                               loaned_at, due_date, returned_at, fine)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(loan.id().as_ref())
        .bind(loan.book_id().as_ref())
        .bind(loan.user_id().as_ref())
        .bind(loan.book_title().as_ref())
        .bind(loan.user_name().as_ref())
        .bind(loan.pickup_code().as_ref())
        .bind(loan.status().as_str())
        .bind(loan.loaned_at().as_ref())
        .bind(loan.due_date().as_ref().map(|due| *due.as_ref()))
        .bind(loan.returned_at().as_ref().map(|at| *at.as_ref()))
        .bind(loan.fine().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn update(
        con: &mut PgConnection,
        loan: &Loan,
        expected: &LoanStatus,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET status = $2, due_date = $3, returned_at = $4, fine = $5
            WHERE id = $1 AND status = $6
            "#,
        )
        .bind(loan.id().as_ref())
        .bind(loan.status().as_str())
        .bind(loan.due_date().as_ref().map(|due| *due.as_ref()))
        .bind(loan.returned_at().as_ref().map(|at| *at.as_ref()))
        .bind(loan.fine().as_ref())
        .bind(expected.as_str())
        .execute(con)
        .await
        .convert_error()?;
        if result.rows_affected() == 0 {
            return Err(Report::new(KernelError::Conflict).attach_printable(format!(
                "loan {:?} is no longer {}",
                loan.id(),
                expected.as_str()
            )));
        }
        Ok(())
    }
}
