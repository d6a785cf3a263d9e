#[cfg(test)]
mod fixture;
mod listing;
mod loan;
mod pending;
mod reconcile;
mod release;
mod reservation;

pub use self::{listing::*, loan::*, pending::*, reconcile::*, release::*, reservation::*};

use error_stack::Report;
use kernel::interface::job::{PendingUpdate, PendingUpdateQueue};
use kernel::KernelError;
use std::fmt::Debug;
use tracing::{error, warn};

fn not_found(what: &str, id: impl Debug) -> Report<KernelError> {
    Report::new(KernelError::NotFound).attach_printable(format!("{what} {id:?} not found"))
}

/// Parks a secondary update after the primary record is durable. Never fails the workflow.
async fn defer<Q: PendingUpdateQueue>(
    queue: &Q,
    deferred: &mut Vec<PendingUpdate>,
    update: PendingUpdate,
    cause: Report<KernelError>,
) {
    warn!(?update, "Secondary update deferred: {cause:?}");
    if let Err(report) = queue.enqueue(&update).await {
        error!(?update, "Failed to enqueue pending update: {report:?}");
    }
    deferred.push(update);
}
