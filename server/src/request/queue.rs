use crate::controller::Intake;
use application::transfer::{GetFailedUpdatesDto, QueueTarget};
use serde::Deserialize;

const DEFAULT_PAGE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct FailedUpdatesRequest {
    size: Option<i64>,
    offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueLenTarget {
    Queued,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct QueueLenRequest {
    target: QueueLenTarget,
}

pub struct QueueTransformer;

impl Intake<FailedUpdatesRequest> for QueueTransformer {
    type To = GetFailedUpdatesDto;
    fn emit(&self, input: FailedUpdatesRequest) -> Self::To {
        GetFailedUpdatesDto {
            size: input.size.unwrap_or(DEFAULT_PAGE),
            offset: input.offset.unwrap_or(0),
        }
    }
}

impl Intake<QueueLenRequest> for QueueTransformer {
    type To = QueueTarget;
    fn emit(&self, input: QueueLenRequest) -> Self::To {
        match input.target {
            QueueLenTarget::Queued => QueueTarget::Queued,
            QueueLenTarget::Failed => QueueTarget::Failed,
        }
    }
}
