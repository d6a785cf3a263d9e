use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{FailedUpdatesRequest, QueueLenRequest, QueueTransformer};
use crate::response::MaintenancePresenter;
use application::service::PendingUpdateQueueService;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;

pub trait QueueRouter {
    fn route_queue(self) -> Self;
}

impl QueueRouter for Router<AppModule> {
    fn route_queue(self) -> Self {
        self.route(
            "/queue/failed",
            get(
                |State(module): State<AppModule>, Query(req): Query<FailedUpdatesRequest>| async move {
                    Controller::new(QueueTransformer, MaintenancePresenter)
                        .intake(req)
                        .handle(|dto| async move { module.failed_updates(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/queue/len",
            get(
                |State(module): State<AppModule>, Query(req): Query<QueueLenRequest>| async move {
                    Controller::new(QueueTransformer, MaintenancePresenter)
                        .intake(req)
                        .handle(|target| async move { module.queue_len(target).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
