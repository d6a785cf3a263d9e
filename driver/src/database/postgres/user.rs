use error_stack::Report;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use kernel::interface::query::UserQuery;
use kernel::interface::update::UserModifier;
use kernel::prelude::entity::{
    AccountActive, CurrentLoans, FineAmount, LoanLimit, User, UserId, UserName,
};
use kernel::{KernelError, Precondition};

use crate::database::postgres::{exists, moved_or_missing};
use crate::error::ConvertError;

pub struct PostgresUserRepository;

#[async_trait::async_trait]
impl UserQuery for PostgresUserRepository {
    type Connection = PoolConnection<Postgres>;
    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &UserId,
    ) -> error_stack::Result<Option<User>, KernelError> {
        PgUserInternal::find_by_id(con, id).await
    }
}

#[async_trait::async_trait]
impl UserModifier for PostgresUserRepository {
    type Connection = PoolConnection<Postgres>;

    async fn create(
        &self,
        con: &mut Self::Connection,
        user: &User,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::create(con, user).await
    }

    async fn increment_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::increment_loans(con, user_id).await
    }

    async fn decrement_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<bool, KernelError> {
        PgUserInternal::decrement_loans(con, user_id).await
    }

    async fn restore_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        recorded: &CurrentLoans,
        current: &CurrentLoans,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::restore_loans(con, user_id, recorded, current).await
    }

    async fn restore_fines(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        recorded: &FineAmount,
        total: &FineAmount,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::restore_fines(con, user_id, recorded, total).await
    }

    async fn add_fine(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        amount: &FineAmount,
    ) -> error_stack::Result<(), KernelError> {
        PgUserInternal::add_fine(con, user_id, amount).await
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    loan_limit: i32,
    current_loans: i32,
    is_active: bool,
    total_fines: i64,
}

impl From<UserRow> for User {
    fn from(value: UserRow) -> Self {
        User::new(
            UserId::new(value.id),
            UserName::new(value.name),
            LoanLimit::new(value.loan_limit),
            CurrentLoans::new(value.current_loans),
            AccountActive::new(value.is_active),
            FineAmount::new(value.total_fines),
        )
    }
}

fn not_found(id: &UserId) -> Report<KernelError> {
    Report::new(KernelError::NotFound).attach_printable(format!("user {id:?} not found"))
}

pub(in crate::database) struct PgUserInternal;

impl PgUserInternal {
    async fn find_by_id(
        con: &mut PgConnection,
        id: &UserId,
    ) -> error_stack::Result<Option<User>, KernelError> {
        let row = sqlx::query_as::<_, UserRow>(
            // language=postgresql
            r#"
            SELECT id, name, loan_limit, current_loans, is_active, total_fines
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .fetch_optional(con)
        .await
        .convert_error()?;
        Ok(row.map(User::from))
    }

    async fn create(con: &mut PgConnection, user: &User) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        sqlx::query(
            r#"
            INSERT INTO users (id, name, loan_limit, current_loans, is_active, total_fines)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id().as_ref())
        .bind(user.name().as_ref())
        .bind(user.loan_limit().as_ref())
        .bind(user.current_loans().as_ref())
        .bind(user.active().as_ref())
        .bind(user.total_fines().as_ref())
        .execute(con)
        .await
        .convert_error()?;
        Ok(())
    }

    async fn increment_loans(
        con: &mut PgConnection,
        id: &UserId,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE users
            SET current_loans = current_loans + 1
            WHERE id = $1 AND current_loans < loan_limit
            "#,
        )
        .bind(id.as_ref())
        .execute(&mut *con)
        .await
        .convert_error()?;
        if result.rows_affected() > 0 {
            return Ok(());
        }
        if exists(con, "users", id.as_ref()).await? {
            Err(Report::new(KernelError::from(Precondition::LoanLimitExceeded)))
        } else {
            Err(not_found(id))
        }
    }

    async fn decrement_loans(
        con: &mut PgConnection,
        id: &UserId,
    ) -> error_stack::Result<bool, KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE users
            SET current_loans = current_loans - 1
            WHERE id = $1 AND current_loans > 0
            "#,
        )
        .bind(id.as_ref())
        .execute(&mut *con)
        .await
        .convert_error()?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if exists(con, "users", id.as_ref()).await? {
            Ok(false)
        } else {
            Err(not_found(id))
        }
    }

    async fn restore_loans(
        con: &mut PgConnection,
        id: &UserId,
        recorded: &CurrentLoans,
        current: &CurrentLoans,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE users
            SET current_loans = LEAST(GREATEST($3, 0), loan_limit)
            WHERE id = $1 AND current_loans = $2
            "#,
        )
        .bind(id.as_ref())
        .bind(recorded.as_ref())
        .bind(current.as_ref())
        .execute(&mut *con)
        .await
        .convert_error()?;
        if result.rows_affected() == 0 {
            return Err(moved_or_missing(con, "users", id.as_ref(), "current_loans").await);
        }
        Ok(())
    }

    async fn restore_fines(
        con: &mut PgConnection,
        id: &UserId,
        recorded: &FineAmount,
        total: &FineAmount,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE users
            SET total_fines = GREATEST($3, 0)
            WHERE id = $1 AND total_fines = $2
            "#,
        )
        .bind(id.as_ref())
        .bind(recorded.as_ref())
        .bind(total.as_ref())
        .execute(&mut *con)
        .await
        .convert_error()?;
        if result.rows_affected() == 0 {
            return Err(moved_or_missing(con, "users", id.as_ref(), "total_fines").await);
        }
        Ok(())
    }

    async fn add_fine(
        con: &mut PgConnection,
        id: &UserId,
        amount: &FineAmount,
    ) -> error_stack::Result<(), KernelError> {
        // language=postgresql
        let result = sqlx::query(
            r#"
            UPDATE users
            SET total_fines = total_fines + $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_ref())
        .bind(amount.as_ref())
        .execute(con)
        .await
        .convert_error()?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use kernel::interface::database::DatabaseConnection;
    use kernel::interface::query::UserQuery;
    use kernel::interface::update::UserModifier;
    use kernel::prelude::entity::{
        AccountActive, CurrentLoans, FineAmount, LoanLimit, User, UserId, UserName,
    };
    use kernel::{KernelError, Precondition};
    use uuid::Uuid;

    use crate::database::postgres::user::PostgresUserRepository;
    use crate::database::postgres::PostgresDatabase;

    #[test_with::env(POSTGRES_TEST)]
    #[tokio::test]
    async fn loan_counter_is_guarded() -> error_stack::Result<(), KernelError> {
        let db = PostgresDatabase::new().await?;
        db.migrate().await?;
        let mut con = db.acquire().await?;

        let id = UserId::new(Uuid::new_v4());
        let user = User::new(
            id.clone(),
            UserName::new("Dr. Bloodmoney"),
            LoanLimit::new(1),
            CurrentLoans::new(0),
            AccountActive::new(true),
            FineAmount::zero(),
        );
        PostgresUserRepository.create(&mut con, &user).await?;

        PostgresUserRepository.increment_loans(&mut con, &id).await?;
        let report = PostgresUserRepository
            .increment_loans(&mut con, &id)
            .await
            .unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::LoanLimitExceeded)
        );

        assert!(PostgresUserRepository.decrement_loans(&mut con, &id).await?);
        assert!(!PostgresUserRepository.decrement_loans(&mut con, &id).await?);

        PostgresUserRepository
            .add_fine(&mut con, &id, &FineAmount::new(3))
            .await?;
        let found = PostgresUserRepository
            .find_by_id(&mut con, &id)
            .await?
            .map(|user| *user.total_fines());
        assert_eq!(found, Some(FineAmount::new(3)));

        let report = PostgresUserRepository
            .restore_fines(&mut con, &id, &FineAmount::zero(), &FineAmount::zero())
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);
        PostgresUserRepository
            .restore_fines(&mut con, &id, &FineAmount::new(3), &FineAmount::new(1))
            .await?;
        let report = PostgresUserRepository
            .restore_loans(&mut con, &id, &CurrentLoans::new(1), &CurrentLoans::new(0))
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Conflict);
        Ok(())
    }
}
