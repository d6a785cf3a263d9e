use crate::handler::Handler;
use application::service::ApplyPendingUpdateService;
use error_stack::Report;
use kernel::interface::job::{ErrorOperation, QueueConfig};
use kernel::KernelError;
use std::sync::Arc;

/// Store outages and lost races are worth another delivery; anything else will fail the
/// same way next time.
fn classify(report: Report<KernelError>) -> Report<ErrorOperation> {
    let operation = match report.current_context() {
        KernelError::StoreUnavailable | KernelError::Conflict => ErrorOperation::Delay,
        _ => ErrorOperation::Failed,
    };
    report.change_context(operation)
}

pub fn init_pending_update_worker(handler: &Arc<Handler>, config: QueueConfig) {
    let worker = Arc::clone(handler);
    handler.queue().start_workers(config, move |update| {
        let handler = Arc::clone(&worker);
        Box::pin(async move { handler.apply_pending_update(update).await.map_err(classify) })
    });
}
