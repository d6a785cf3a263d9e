use error_stack::Report;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use kernel::interface::query::ReservationQuery;
use kernel::interface::update::ReservationModifier;
use kernel::prelude::entity::{
    BookId, BookTitle, CreatedAt, ExpiresAt, NotifiedAt, Reservation, ReservationId,
    ReservationStatus, UserId, UserName,
};
use kernel::KernelError;

use crate::error::ConvertError;

pub struct PostgresReservationRepository;

#[async_trait::async_trait]
impl ReservationQuery for PostgresReservationRepository {
    type Connection = PoolConnection<Postgres>;

    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &ReservationId,
    ) -> error_stack::Result<Option<Reservation>, KernelError> {
        PgReservationInternal::find_by_id(con, id).await
    }

    async fn find_by_book_id(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Reservation>, KernelError> {
        PgReservationInternal::find_by_book_id(con, book_id).await
    }

    async fn find_by_user_id(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<Reservation>, KernelError> {
        PgReservationInternal::find_by_user_id(con, user_id).await
    }
}

#[async_trait::async_trait]
impl ReservationModifier for PostgresReservationRepository {
    type Connection = PoolConnection<Postgres>;

    async fn create(
        &self,
        con: &mut Self::Connection,
        reservation: &Reservation,
    ) -> error_stack::Result<(), KernelError> {
        PgReservationInternal::create(con, reservation).await
    }

    async fn update(
        &self,
        con: &mut Self::Connection,
        reservation: &Reservation,
        expected: &ReservationStatus,
    ) -> error_stack::Result<(), KernelError> {
        PgReservationInternal::update(con, reservation, expected).await
    }
}

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    book_id: Uuid,
    user_id: Uuid,
    book_title: String,
    user_name: String,
    status: String,
    reserved_at: OffsetDateTime,
    expires_at: OffsetDateTime,
    notified_at: Option<OffsetDateTime>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = Report<KernelError>;
    fn try_from(value: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation::new(
            ReservationId::new(value.id),
            BookId::new(value.book_id),
            UserId::new(value.user_id),
            BookTitle::new(value.book_title),
            UserName::new(value.user_name),
            ReservationStatus::parse(&value.status)?,
            CreatedAt::new(value.reserved_at),
            ExpiresAt::new(value.expires_at),
            value.notified_at.map(NotifiedAt::new),
        ))
    }
}

fn collect(rows: Vec<ReservationRow>) -> error_stack::Result<Vec<Reservation>, KernelError> {
    rows.into_iter().map(Reservation::try_from).collect()
}

pub(in crate::database) struct PgReservationInternal;

impl PgReservationInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &ReservationId,
    ) -> error_stack::Result<Option<Reservation>, KernelError> {
        let row = sqlx::query_as::<_, ReservationRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, status,
                   reserved_at, expires_at, notified_at
            FROM reservations
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        row.map(Reservation::try_from).transpose()
    }

    async fn find_by_book_id(
        con: &mut PgConnection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Reservation>, KernelError> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, status,
                   reserved_at, expires_at, notified_at
            FROM reservations
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
    ) -> error_stack::Result<Vec<Reservation>, KernelError> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            // language=postgresql
            r#"
            SELECT id, book_id, user_id, book_title, user_name, status,
                   reserved_at, expires_at, notified_at
            FROM reservations
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_ref())
        .fetch_all(con)
        .await
        .convert_error()?;
        collect(rows)
    }

    async fn create(
        con: &mut PgConnection,
        reservation: &Reservation,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            INSERT INTO reservations (id, book_id, user_id, book_title, user_name, status,
                                      reserved_at, expires_at, notified_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(reservation.id().as_ref())
        .bind(reservation.book_id().as_ref())
        .bind(reservation.user_id().as_ref())
        .bind(reservation.book_title().as_ref())
        .bind(reservation.user_name().as_ref())
        .bind(reservation.status().as_str())
        .bind(reservation.reserved_at().as_ref())
        .bind(reservation.expires_at().as_ref())
        .bind(reservation.notified_at().as_ref().map(|at| *at.as_ref()))
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn update(
        con: &mut PgConnection,
        reservation: &Reservation,
        expected: &ReservationStatus,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE reservations
            SET status = $2, expires_at = $3, notified_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(reservation.id().as_ref())
        .bind(reservation.status().as_str())
        .bind(reservation.expires_at().as_ref())
        .bind(reservation.notified_at().as_ref().map(|at| *at.as_ref()))
        .bind(expected.as_str())
        .execute(con)
        .await
        .convert_error()?;
        if result.rows_affected() == 0 {
            return Err(Report::new(KernelError::Conflict).attach_printable(format!(
                "reservation {:?} is no longer {}",
                reservation.id(),
                expected.as_str()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use kernel::interface::database::DatabaseConnection;
    use kernel::interface::query::{LoanQuery, ReservationQuery};
    use kernel::interface::update::{
        BookModifier, LoanModifier, ReservationModifier, UserModifier,
    };
    use kernel::prelude::entity::{
        Book, BookId, BookTitle, Loan, LoanId, LoanStatus, PickupCode, Reservation,
        ReservationId, ReservationStatus, TotalCopies, User, UserId, UserName,
    };
    use kernel::KernelError;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    use crate::database::postgres::{
        PostgresBookRepository, PostgresDatabase, PostgresLoanRepository,
        PostgresReservationRepository, PostgresUserRepository,
    };

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn status_updates_are_compare_and_set() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        db.migrate().await?;
        let mut con = db.acquire().await?;
        let now = OffsetDateTime::now_utc();

        let book = Book::catalogue(
            BookId::new(Uuid::new_v4()),
            BookTitle::new("VALIS"),
            TotalCopies::new(1),
        );
        let user = User::register(UserId::new(Uuid::new_v4()), UserName::new("Horselover Fat"));
        PostgresBookRepository.create(&mut con, &book).await?;
        PostgresUserRepository.create(&mut con, &user).await?;

        let code = PickupCode::generate();
        let mut loan = Loan::open(LoanId::new(Uuid::new_v4()), &book, &user, code.clone(), now);
        PostgresLoanRepository.create(&mut con, &loan).await?;
        let found = PostgresLoanRepository
            .find_by_pickup_code(&mut con, &code, &LoanStatus::PendingPickup)
            .await?;
        assert_eq!(found.as_ref().map(Loan::id), Some(loan.id()));

        loan.confirm_pickup(now, Duration::days(14))?;
        PostgresLoanRepository
            .update(&mut con, &loan, &LoanStatus::PendingPickup)
            .await?;
        let report = PostgresLoanRepository
            .update(&mut con, &loan, &LoanStatus::PendingPickup)
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);

        let pending = Reservation::enqueue(
            ReservationId::new(Uuid::new_v4()),
            &book,
            &user,
            now,
            Duration::days(7),
        );
        PostgresReservationRepository
            .create(&mut con, &pending)
            .await?;

        let mut first = pending.clone();
        let mut second = pending.clone();
        first.mark_ready(now, Duration::days(3))?;
        second.mark_ready(now, Duration::days(3))?;
        PostgresReservationRepository
            .update(&mut con, &first, &ReservationStatus::Pending)
            .await?;
        let report = PostgresReservationRepository
            .update(&mut con, &second, &ReservationStatus::Pending)
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);

        let queue = PostgresReservationRepository
            .find_by_book_id(&mut con, book.id())
            .await?;
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status(), &ReservationStatus::Ready);
        Ok(())
    }
}
