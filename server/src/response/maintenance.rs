use crate::controller::Exhaust;
use application::transfer::{FailedUpdateDto, ReconcileReportDto};
use axum::Json;
use kernel::interface::job::PendingUpdate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    id: Uuid,
    corrected: bool,
    counters: Vec<CounterResponse>,
}

#[derive(Debug, Serialize)]
pub struct CounterResponse {
    counter: &'static str,
    recorded: i64,
    expected: i64,
    corrected: bool,
}

#[derive(Debug, Serialize)]
pub struct FailedUpdateResponse {
    id: Uuid,
    update: PendingUpdate,
    stack_trace: String,
}

#[derive(Debug, Serialize)]
pub struct QueueLenResponse {
    length: usize,
}

pub struct MaintenancePresenter;

impl Exhaust<ReconcileReportDto> for MaintenancePresenter {
    type To = Json<ReconcileResponse>;
    fn emit(&self, input: ReconcileReportDto) -> Self::To {
        Json(ReconcileResponse {
            id: input.id,
            corrected: input.corrected(),
            counters: input
                .counters
                .into_iter()
                .map(|counter| CounterResponse {
                    counter: counter.counter,
                    recorded: counter.recorded,
                    expected: counter.expected,
                    corrected: counter.corrected,
                })
                .collect(),
        })
    }
}

impl Exhaust<Vec<FailedUpdateDto>> for MaintenancePresenter {
    type To = Json<Vec<FailedUpdateResponse>>;
    fn emit(&self, input: Vec<FailedUpdateDto>) -> Self::To {
        Json(
            input
                .into_iter()
                .map(|failed| FailedUpdateResponse {
                    id: failed.id,
                    update: failed.update,
                    stack_trace: failed.stack_trace,
                })
                .collect(),
        )
    }
}

impl Exhaust<usize> for MaintenancePresenter {
    type To = Json<QueueLenResponse>;
    fn emit(&self, input: usize) -> Self::To {
        Json(QueueLenResponse { length: input })
    }
}
