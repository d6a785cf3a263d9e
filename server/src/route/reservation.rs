use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{CallerRequest, CancelReservationRequest, ReservationTransformer};
use crate::response::{LoanPresenter, ReservationPresenter};
use application::service::{BorrowFromReservationService, CancelReservationService};
use axum::extract::{Path, Query, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use uuid::Uuid;

pub trait ReservationRouter {
    fn route_reservation(self) -> Self;
}

impl ReservationRouter for Router<AppModule> {
    fn route_reservation(self) -> Self {
        self.route(
            "/reservations/:id/loans",
            post(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Json(req): Json<CallerRequest>| async move {
                    Controller::new(ReservationTransformer, LoanPresenter)
                        .intake((id, req))
                        .handle(|dto| async move { module.borrow_from_reservation(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/reservations/:id",
            delete(
                |State(module): State<AppModule>,
                 Path(id): Path<Uuid>,
                 Query(caller): Query<CallerRequest>| async move {
                    Controller::new(ReservationTransformer, ReservationPresenter)
                        .intake(CancelReservationRequest::new(id, caller))
                        .handle(|dto| async move { module.cancel_reservation(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
