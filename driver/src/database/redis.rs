mod mq;

use crate::env;
use crate::error::ConvertError;
use deadpool_redis::redis::RedisError;
use deadpool_redis::{Config, Connection, Pool, PoolError, Runtime};
use error_stack::{Report, ResultExt};
use kernel::interface::database::DatabaseConnection;
use kernel::KernelError;

pub use crate::database::redis::mq::*;

const REDIS_URL: &str = "REDIS_URL";

#[derive(Clone)]
pub struct RedisDatabase {
    pool: Pool,
}

impl RedisDatabase {
    pub fn new() -> error_stack::Result<Self, KernelError> {
        let url = env(REDIS_URL)?;
        let cfg = Config::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .change_context_lazy(|| KernelError::Internal)?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for RedisDatabase {
    type Connection = Connection;
    async fn acquire(&self) -> error_stack::Result<Self::Connection, KernelError> {
        self.pool.get().await.convert_error()
    }
}

impl<T> ConvertError for Result<T, PoolError> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| {
            let unavailable = match &error {
                PoolError::Timeout(_) | PoolError::Closed => true,
                PoolError::Backend(backend) => backend.is_io_error(),
                _ => false,
            };
            if unavailable {
                Report::new(error).change_context(KernelError::StoreUnavailable)
            } else {
                Report::new(error).change_context(KernelError::Internal)
            }
        })
    }
}

impl<T> ConvertError for Result<T, RedisError> {
    type Ok = T;
    fn convert_error(self) -> error_stack::Result<T, KernelError> {
        self.map_err(|error| {
            if error.is_io_error() || error.is_timeout() || error.is_connection_dropped() {
                Report::new(error).change_context(KernelError::StoreUnavailable)
            } else {
                Report::new(error).change_context(KernelError::Internal)
            }
        })
    }
}
