use kernel::interface::config::{Clock, DependOnClock, DependOnLendingPolicy};
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::query::{DependOnReservationQuery, ReservationQuery};
use kernel::interface::update::{
    BookModifier, DependOnBookModifier, DependOnReservationModifier, ReservationModifier,
};
use kernel::prelude::entity::{next_pending, BookId, ReservationStatus};
use kernel::KernelError;
use tracing::{debug, info, warn};

use crate::transfer::ReleaseOutcome;

/// Decides where a freed copy goes: to the oldest pending reservation, or back to the pool.
/// Exactly one of the two happens.
#[async_trait::async_trait]
pub trait ReleaseCopyService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnLendingPolicy
    + DependOnDatabaseConnection
    + DependOnReservationQuery
    + DependOnReservationModifier
    + DependOnBookModifier
{
    /// Only a lost mark-ready race falls back to the pool. Any other failure returns `Err` so
    /// the caller defers the whole release instead of risking the copy being counted twice.
    #[tracing::instrument(skip(self, con))]
    async fn release_copy(
        &self,
        con: &mut <Self::DatabaseConnection as DatabaseConnection>::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<ReleaseOutcome, KernelError> {
        let reservations = self
            .reservation_query()
            .find_by_book_id(con, book_id)
            .await?;

        if let Some(next) = next_pending(&reservations) {
            let mut next = next.clone();
            let now = self.clock().now();
            let window = *self.lending_policy().ready_window();
            let marked = match next.mark_ready(now, window) {
                Ok(()) => {
                    self.reservation_modifier()
                        .update(con, &next, &ReservationStatus::Pending)
                        .await
                }
                Err(report) => Err(report),
            };
            match marked {
                Ok(()) => {
                    info!(reservation_id = ?next.id(), "Copy handed to next reservation");
                    return Ok(ReleaseOutcome::HandedToReservation {
                        reservation_id: *next.id().as_ref(),
                    });
                }
                Err(report) if report.current_context().is_conflict() => {
                    debug!(reservation_id = ?next.id(), "Lost mark-ready race, releasing to pool");
                }
                Err(report) => {
                    // The write may have landed before the error
                    warn!(reservation_id = ?next.id(), "Mark-ready failed: {report:?}");
                    let landed = self
                        .reservation_query()
                        .find_by_id(con, next.id())
                        .await
                        .ok()
                        .flatten()
                        .is_some_and(|stored| stored == next);
                    if landed {
                        info!(reservation_id = ?next.id(), "Copy handed to next reservation");
                        return Ok(ReleaseOutcome::HandedToReservation {
                            reservation_id: *next.id().as_ref(),
                        });
                    }
                    return Err(report);
                }
            }
        }

        let moved = self
            .book_modifier()
            .increment_available(con, book_id)
            .await?;
        if !moved {
            warn!("Available copies already at total");
        }
        Ok(ReleaseOutcome::ReturnedToPool { moved })
    }
}

impl<T> ReleaseCopyService for T where
    T: DependOnClock
        + DependOnLendingPolicy
        + DependOnDatabaseConnection
        + DependOnReservationQuery
        + DependOnReservationModifier
        + DependOnBookModifier
{
}
