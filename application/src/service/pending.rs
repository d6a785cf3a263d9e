use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::job::{DependOnPendingUpdateQueue, PendingUpdate, PendingUpdateQueue};
use kernel::interface::query::{DependOnReservationQuery, ReservationQuery};
use kernel::interface::update::{
    BookModifier, DependOnBookModifier, DependOnReservationModifier, DependOnUserModifier,
    ReservationModifier, UserModifier,
};
use kernel::prelude::entity::ReservationStatus;
use kernel::KernelError;
use tracing::{debug, info};

use crate::service::{not_found, ReleaseCopyService};
use crate::transfer::{FailedUpdateDto, GetFailedUpdatesDto, QueueTarget};

/// Re-applies one parked update. Run by the queue workers; an `Err` means "try again later".
#[async_trait::async_trait]
pub trait ApplyPendingUpdateService:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection
    + DependOnReservationQuery
    + DependOnReservationModifier
    + DependOnBookModifier
    + DependOnUserModifier
    + ReleaseCopyService
{
    #[tracing::instrument(skip(self))]
    async fn apply_pending_update(
        &self,
        update: PendingUpdate,
    ) -> error_stack::Result<(), KernelError> {
        let mut con = self.database_connection().acquire().await?;
        match update {
            PendingUpdate::DecrementAvailability { book_id } => {
                self.book_modifier()
                    .decrement_available(&mut con, &book_id)
                    .await?;
            }
            PendingUpdate::ReleaseCopy { book_id } => {
                let outcome = self.release_copy(&mut con, &book_id).await?;
                debug!(?outcome, "Deferred copy released");
            }
            PendingUpdate::IncrementUserLoans { user_id } => {
                self.user_modifier()
                    .increment_loans(&mut con, &user_id)
                    .await?;
            }
            PendingUpdate::DecrementUserLoans { user_id } => {
                self.user_modifier()
                    .decrement_loans(&mut con, &user_id)
                    .await?;
            }
            PendingUpdate::CompleteReservation { reservation_id } => {
                let mut reservation = self
                    .reservation_query()
                    .find_by_id(&mut con, &reservation_id)
                    .await?
                    .ok_or_else(|| not_found("reservation", &reservation_id))?;
                if reservation.settle()? {
                    self.reservation_modifier()
                        .update(&mut con, &reservation, &ReservationStatus::Ready)
                        .await?;
                }
            }
            PendingUpdate::ChargeFine { user_id, amount } => {
                self.user_modifier()
                    .add_fine(&mut con, &user_id, &amount)
                    .await?;
            }
        }
        info!("Pending update applied");
        Ok(())
    }
}

impl<T> ApplyPendingUpdateService for T where
    T: DependOnDatabaseConnection
        + DependOnReservationQuery
        + DependOnReservationModifier
        + DependOnBookModifier
        + DependOnUserModifier
        + ReleaseCopyService
{
}

#[async_trait::async_trait]
pub trait PendingUpdateQueueService: 'static + Sync + Send + DependOnPendingUpdateQueue {
    async fn failed_updates(
        &self,
        dto: GetFailedUpdatesDto,
    ) -> error_stack::Result<Vec<FailedUpdateDto>, KernelError> {
        let failed = self
            .pending_update_queue()
            .failed(dto.size, dto.offset)
            .await?;
        Ok(failed.into_iter().map(FailedUpdateDto::from).collect())
    }

    async fn queue_len(&self, target: QueueTarget) -> error_stack::Result<usize, KernelError> {
        match target {
            QueueTarget::Queued => self.pending_update_queue().queued_len().await,
            QueueTarget::Failed => self.pending_update_queue().failed_len().await,
        }
    }
}

impl<T> PendingUpdateQueueService for T where T: DependOnPendingUpdateQueue {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::service::fixture::{available, book, current_loans, user};
    use driver::database::InMemoryDatabase;
    use kernel::prelude::entity::{BookId, FineAmount, UserId};
    use uuid::Uuid;

    #[tokio::test]
    async fn counters_are_guarded_when_replayed() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Ghanima").await;

        db.apply_pending_update(PendingUpdate::ReleaseCopy {
            book_id: BookId::new(book_id),
        })
        .await?;
        assert_eq!(available(&db, book_id).await, 1);

        db.apply_pending_update(PendingUpdate::DecrementUserLoans {
            user_id: UserId::new(user_id),
        })
        .await?;
        assert_eq!(current_loans(&db, user_id).await, 0);

        db.apply_pending_update(PendingUpdate::ChargeFine {
            user_id: UserId::new(user_id),
            amount: FineAmount::new(3),
        })
        .await?;
        let user = db.user(&UserId::new(user_id)).await.unwrap();
        assert_eq!(*user.total_fines().as_ref(), 3);

        let report = db
            .apply_pending_update(PendingUpdate::IncrementUserLoans {
                user_id: UserId::new(Uuid::new_v4()),
            })
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn failed_updates_are_listed() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let update = PendingUpdate::ReleaseCopy {
            book_id: BookId::new(Uuid::new_v4()),
        };
        db.pending_update_queue()
            .park_failed(update.clone(), "store unavailable")
            .await;
        db.pending_update_queue().enqueue(&update).await?;

        assert_eq!(db.queue_len(QueueTarget::Queued).await?, 1);
        assert_eq!(db.queue_len(QueueTarget::Failed).await?, 1);
        let failed = db
            .failed_updates(GetFailedUpdatesDto { size: 10, offset: 0 })
            .await?;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].update, update);
        assert_eq!(failed[0].stack_trace, "store unavailable");
        Ok(())
    }
}
