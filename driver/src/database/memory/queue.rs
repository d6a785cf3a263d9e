use std::collections::VecDeque;
use std::sync::Arc;

use error_stack::Report;
use kernel::interface::job::{ErroredInfo, PendingUpdate, PendingUpdateQueue, QueueInfo};
use kernel::KernelError;
use tokio::sync::Mutex;

#[derive(Default)]
struct QueueState {
    queued: VecDeque<QueueInfo<PendingUpdate>>,
    failed: Vec<ErroredInfo<PendingUpdate>>,
    reject: bool,
}

/// Pending updates kept in process memory. Nothing consumes them on its own; callers drain
/// the queue with [`InMemoryPendingUpdateQueue::take_all`].
#[derive(Clone, Default)]
pub struct InMemoryPendingUpdateQueue(Arc<Mutex<QueueState>>);

impl InMemoryPendingUpdateQueue {
    pub async fn take_all(&self) -> Vec<PendingUpdate> {
        let mut state = self.0.lock().await;
        state
            .queued
            .drain(..)
            .map(|info| info.into_destruct().data)
            .collect()
    }

    pub async fn park_failed(&self, update: PendingUpdate, stack_trace: impl Into<String>) {
        let info = QueueInfo::from(update).into_destruct();
        let mut state = self.0.lock().await;
        state
            .failed
            .push(ErroredInfo::new(info.id, info.data, stack_trace.into()));
    }

    /// While set, every enqueue fails as if the broker were down.
    pub async fn reject_enqueue(&self, reject: bool) {
        self.0.lock().await.reject = reject;
    }
}

#[async_trait::async_trait]
impl PendingUpdateQueue for InMemoryPendingUpdateQueue {
    async fn enqueue(&self, update: &PendingUpdate) -> error_stack::Result<(), KernelError> {
        let mut state = self.0.lock().await;
        if state.reject {
            return Err(Report::new(KernelError::StoreUnavailable)
                .attach_printable("pending update queue rejected the write"));
        }
        state.queued.push_back(QueueInfo::from(update.clone()));
        Ok(())
    }

    async fn queued_len(&self) -> error_stack::Result<usize, KernelError> {
        Ok(self.0.lock().await.queued.len())
    }

    async fn failed(
        &self,
        size: i64,
        offset: i64,
    ) -> error_stack::Result<Vec<ErroredInfo<PendingUpdate>>, KernelError> {
        if size <= 0 {
            return Ok(vec![]);
        }
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let offset = usize::try_from(offset).unwrap_or(0);
        let state = self.0.lock().await;
        Ok(state.failed.iter().skip(offset).take(size).cloned().collect())
    }

    async fn failed_len(&self) -> error_stack::Result<usize, KernelError> {
        Ok(self.0.lock().await.failed.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use kernel::prelude::entity::BookId;
    use uuid::Uuid;

    #[tokio::test]
    async fn keeps_order_and_pages_failures() -> error_stack::Result<(), KernelError> {
        let queue = InMemoryPendingUpdateQueue::default();
        let first = PendingUpdate::ReleaseCopy {
            book_id: BookId::new(Uuid::new_v4()),
        };
        let second = PendingUpdate::DecrementAvailability {
            book_id: BookId::new(Uuid::new_v4()),
        };
        queue.enqueue(&first).await?;
        queue.enqueue(&second).await?;
        assert_eq!(queue.queued_len().await?, 2);
        assert_eq!(queue.take_all().await, vec![first.clone(), second.clone()]);
        assert_eq!(queue.queued_len().await?, 0);

        queue.park_failed(first, "gave up").await;
        queue.park_failed(second.clone(), "gave up").await;
        assert_eq!(queue.failed_len().await?, 2);
        let page = queue.failed(5, 1).await?;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].data(), &second);
        assert!(queue.failed(0, 0).await?.is_empty());

        queue.reject_enqueue(true).await;
        let report = queue.enqueue(&second).await.unwrap_err();
        assert_eq!(report.current_context(), &KernelError::StoreUnavailable);
        Ok(())
    }
}
