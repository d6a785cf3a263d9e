use driver::config::{lending_policy_from_env, queue_config_from_env, SystemClock};
use driver::database::{
    PostgresBookRepository, PostgresDatabase, PostgresLoanRepository,
    PostgresReservationRepository, PostgresUserRepository, RedisDatabase,
    RedisPendingUpdateQueue,
};
use kernel::interface::config::{DependOnClock, DependOnLendingPolicy, LendingPolicy};
use kernel::interface::database::DependOnDatabaseConnection;
use kernel::interface::job::DependOnPendingUpdateQueue;
use kernel::interface::query::{
    DependOnBookQuery, DependOnLoanQuery, DependOnReservationQuery, DependOnUserQuery,
};
use kernel::interface::update::{
    DependOnBookModifier, DependOnLoanModifier, DependOnReservationModifier, DependOnUserModifier,
};
use kernel::KernelError;
use std::ops::Deref;
use std::sync::Arc;
use tracing::info;

use crate::mq::init_pending_update_worker;

#[derive(Clone)]
pub struct AppModule(Arc<Handler>);

impl AppModule {
    pub async fn new() -> error_stack::Result<Self, KernelError> {
        let handler = Arc::new(Handler::init().await?);
        init_pending_update_worker(&handler, queue_config_from_env()?);
        Ok(Self(handler))
    }
}

impl Deref for AppModule {
    type Target = Handler;
    fn deref(&self) -> &Self::Target {
        Deref::deref(&self.0)
    }
}

pub struct Handler {
    pgpool: PostgresDatabase,
    queue: RedisPendingUpdateQueue,
    clock: SystemClock,
    policy: LendingPolicy,
}

impl Handler {
    pub async fn init() -> error_stack::Result<Self, KernelError> {
        let pgpool = PostgresDatabase::new().await?;
        pgpool.migrate().await?;
        let queue = RedisPendingUpdateQueue::new(RedisDatabase::new()?);
        let policy = lending_policy_from_env()?;
        info!(?policy, "Lending policy loaded");

        Ok(Self {
            pgpool,
            queue,
            clock: SystemClock,
            policy,
        })
    }

    pub fn queue(&self) -> &RedisPendingUpdateQueue {
        &self.queue
    }
}

impl DependOnDatabaseConnection for Handler {
    type DatabaseConnection = PostgresDatabase;
    fn database_connection(&self) -> &Self::DatabaseConnection {
        &self.pgpool
    }
}

impl DependOnClock for Handler {
    type Clock = SystemClock;
    fn clock(&self) -> &Self::Clock {
        &self.clock
    }
}

impl DependOnLendingPolicy for Handler {
    fn lending_policy(&self) -> &LendingPolicy {
        &self.policy
    }
}

impl DependOnPendingUpdateQueue for Handler {
    type PendingUpdateQueue = RedisPendingUpdateQueue;
    fn pending_update_queue(&self) -> &Self::PendingUpdateQueue {
        &self.queue
    }
}

impl DependOnBookQuery for Handler {
    type BookQuery = PostgresBookRepository;
    fn book_query(&self) -> &Self::BookQuery {
        &PostgresBookRepository
    }
}

impl DependOnBookModifier for Handler {
    type BookModifier = PostgresBookRepository;
    fn book_modifier(&self) -> &Self::BookModifier {
        &PostgresBookRepository
    }
}

impl DependOnUserQuery for Handler {
    type UserQuery = PostgresUserRepository;
    fn user_query(&self) -> &Self::UserQuery {
        &PostgresUserRepository
    }
}

impl DependOnUserModifier for Handler {
    type UserModifier = PostgresUserRepository;
    fn user_modifier(&self) -> &Self::UserModifier {
        &PostgresUserRepository
    }
}

impl DependOnLoanQuery for Handler {
    type LoanQuery = PostgresLoanRepository;
    fn loan_query(&self) -> &Self::LoanQuery {
        &PostgresLoanRepository
    }
}

impl DependOnLoanModifier for Handler {
    type LoanModifier = PostgresLoanRepository;
    fn loan_modifier(&self) -> &Self::LoanModifier {
        &PostgresLoanRepository
    }
}

impl DependOnReservationQuery for Handler {
    type ReservationQuery = PostgresReservationRepository;
    fn reservation_query(&self) -> &Self::ReservationQuery {
        &PostgresReservationRepository
    }
}

impl DependOnReservationModifier for Handler {
    type ReservationModifier = PostgresReservationRepository;
    fn reservation_modifier(&self) -> &Self::ReservationModifier {
        &PostgresReservationRepository
    }
}
