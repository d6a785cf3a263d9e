use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{
    BookTransformer, CallerRequest, ExpireReservationsRequest, ReconcileBookRequest,
    ReserveTransformer,
};
use crate::response::{LoanPresenter, MaintenancePresenter, ReservationPresenter};
use application::service::{
    BorrowService, ExpireReservationsService, ReconcileService, ReserveService,
};
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use uuid::Uuid;

pub trait BookRouter {
    fn route_book(self) -> Self;
}

impl BookRouter for Router<AppModule> {
    fn route_book(self) -> Self {
        self.route(
            "/books/:id/loans",
            post(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Json(req): Json<CallerRequest>| async move {
                    Controller::new(BookTransformer, LoanPresenter)
                        .intake((id, req))
                        .handle(|dto| async move { module.borrow(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/books/:id/reservations",
            post(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Json(req): Json<CallerRequest>| async move {
                    Controller::new(ReserveTransformer, ReservationPresenter)
                        .intake((id, req))
                        .handle(|dto| async move { module.reserve(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/books/:id/reservations/expire",
            post(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(BookTransformer, ReservationPresenter)
                        .intake(ExpireReservationsRequest::new(id))
                        .handle(|dto| async move { module.expire_ready(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/books/:id/reconcile",
            post(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(BookTransformer, MaintenancePresenter)
                        .intake(ReconcileBookRequest::new(id))
                        .handle(|dto| async move { module.reconcile_book(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
