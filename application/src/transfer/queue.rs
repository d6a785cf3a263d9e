use kernel::interface::job::{DestructErroredInfo, ErroredInfo, PendingUpdate};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FailedUpdateDto {
    pub id: Uuid,
    pub update: PendingUpdate,
    pub stack_trace: String,
}

impl From<ErroredInfo<PendingUpdate>> for FailedUpdateDto {
    fn from(value: ErroredInfo<PendingUpdate>) -> Self {
        let DestructErroredInfo {
            id,
            data,
            stack_trace,
        } = value.into_destruct();
        Self {
            id,
            update: data,
            stack_trace,
        }
    }
}

pub struct GetFailedUpdatesDto {
    pub size: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum QueueTarget {
    Queued,
    Failed,
}
