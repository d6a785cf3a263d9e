use crate::entity::{BookId, FineAmount, ReservationId, UserId};
use crate::KernelError;
use destructure::Destructure;
use error_stack::Context;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use uuid::Uuid;
use vodca::References;

/// A secondary effect a workflow could not apply after its primary record was committed.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingUpdate {
    DecrementAvailability { book_id: BookId },
    /// A copy came back and has not been handed to the queue or the pool yet.
    ReleaseCopy { book_id: BookId },
    IncrementUserLoans { user_id: UserId },
    DecrementUserLoans { user_id: UserId },
    CompleteReservation { reservation_id: ReservationId },
    ChargeFine { user_id: UserId, amount: FineAmount },
}

#[derive(Debug)]
pub enum ErrorOperation {
    Delay,
    Failed,
}

impl Display for ErrorOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorOperation::Delay => write!(f, "Queue delayed"),
            ErrorOperation::Failed => write!(f, "Queue failed"),
        }
    }
}

impl Context for ErrorOperation {}

pub type AsyncWork = Pin<Box<dyn Future<Output = error_stack::Result<(), ErrorOperation>> + Send>>;

#[derive(Debug, Clone, Serialize, Deserialize, References, Destructure)]
pub struct QueueInfo<T> {
    id: Uuid,
    data: T,
}

impl<T> QueueInfo<T> {
    pub fn new(id: Uuid, data: T) -> Self {
        Self { id, data }
    }
}

impl<T> From<T> for QueueInfo<T> {
    fn from(value: T) -> Self {
        Self::new(Uuid::new_v4(), value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, References, Destructure)]
pub struct ErroredInfo<T> {
    id: Uuid,
    data: T,
    stack_trace: String,
}

impl<T> ErroredInfo<T> {
    pub fn new(id: Uuid, data: T, stack_trace: String) -> Self {
        Self {
            id,
            data,
            stack_trace,
        }
    }
}

#[derive(Debug, Clone, References)]
pub struct QueueConfig {
    worker_count: usize,
    max_retry: i64,
    retry_idle: Duration,
}

impl QueueConfig {
    pub fn new(worker_count: usize, max_retry: i64, retry_idle: Duration) -> Self {
        Self {
            worker_count,
            max_retry,
            retry_idle,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(4, 3, Duration::from_secs(180))
    }
}

/// Where degraded successes park their missing effects until a worker re-applies them.
#[async_trait::async_trait]
pub trait PendingUpdateQueue: 'static + Sync + Send {
    async fn enqueue(&self, update: &PendingUpdate) -> error_stack::Result<(), KernelError>;

    async fn queued_len(&self) -> error_stack::Result<usize, KernelError>;

    async fn failed(
        &self,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<PendingUpdate>>, KernelError>;

    async fn failed_len(&self) -> error_stack::Result<usize, KernelError>;
}

pub trait DependOnPendingUpdateQueue: 'static + Sync + Send {
    type PendingUpdateQueue: PendingUpdateQueue;
    fn pending_update_queue(&self) -> &Self::PendingUpdateQueue;
}
