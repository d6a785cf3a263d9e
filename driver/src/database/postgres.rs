use error_stack::{Report, ResultExt};
use sqlx::pool::PoolConnection;
use sqlx::{Error, Pool, Postgres};

use kernel::interface::database::DatabaseConnection;
use kernel::KernelError;

use crate::env;
use crate::error::ConvertError;

pub use self::{book::*, loan::*, reservation::*, user::*};

mod book;
mod loan;
mod reservation;
mod user;

const POSTGRES_URL: &str = "POSTGRES_URL";

#[derive(Clone)]
pub struct PostgresDatabase {
    pool: Pool<Postgres>,
}

impl PostgresDatabase {
    pub async fn new() -> error_stack::Result<Self, KernelError> {
        let url = env(POSTGRES_URL)?;
        let pool = Pool::connect(&url).await.convert_error()?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> error_stack::Result<(), KernelError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .change_context_lazy(|| KernelError::Internal)
            .attach_printable("Failed to run migrations")
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for PostgresDatabase {
    type Connection = PoolConnection<Postgres>;
    async fn acquire(&self) -> error_stack::Result<Self::Connection, KernelError> {
        self.pool.acquire().await.convert_error()
    }
}

impl<T> ConvertError for Result<T, Error> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| match error {
            Error::PoolTimedOut | Error::PoolClosed | Error::Io(_) | Error::Tls(_) => {
                Report::from(error).change_context(KernelError::StoreUnavailable)
            }
            _ => Report::from(error).change_context(KernelError::Internal),
        })
    }
}

/// Distinguishes "no such row" from "guard refused" after a conditional update matched nothing.
pub(in crate::database) async fn exists(
    con: &mut sqlx::PgConnection,
    table: &'static str,
    id: &uuid::Uuid,
) -> error_stack::Result<bool, KernelError> {
    let query = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = $1)");
    sqlx::query_scalar::<_, bool>(&query)
        .bind(id)
        .fetch_one(con)
        .await
        .convert_error()
}

/// A compare-and-set that matched nothing: `NotFound` for a missing row, otherwise `Conflict`.
pub(in crate::database) async fn moved_or_missing(
    con: &mut sqlx::PgConnection,
    table: &'static str,
    id: &uuid::Uuid,
    column: &str,
) -> Report<KernelError> {
    match exists(con, table, id).await {
        Ok(true) => Report::new(KernelError::Conflict)
            .attach_printable(format!("{table}.{column} of {id} moved before the restore")),
        Ok(false) => Report::new(KernelError::NotFound)
            .attach_printable(format!("{table} row {id} not found")),
        Err(report) => report,
    }
}
