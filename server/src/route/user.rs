use crate::controller::Controller;
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{
    GetUserLoansRequest, GetUserReservationsRequest, ReconcileUserRequest, UserTransformer,
};
use crate::response::{LoanPresenter, MaintenancePresenter, ReservationPresenter};
use application::service::{ListUserLoansService, ListUserReservationsService, ReconcileService};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use uuid::Uuid;

pub trait UserRouter {
    fn route_user(self) -> Self;
}

impl UserRouter for Router<AppModule> {
    fn route_user(self) -> Self {
        self.route(
            "/users/:id/loans",
            get(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(UserTransformer, LoanPresenter)
                        .intake(GetUserLoansRequest::new(id))
                        .handle(|dto| async move { module.list_user_loans(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/users/:id/reservations",
            get(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(UserTransformer, ReservationPresenter)
                        .intake(GetUserReservationsRequest::new(id))
                        .handle(|dto| async move { module.list_user_reservations(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/users/:id/reconcile",
            post(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(UserTransformer, MaintenancePresenter)
                        .intake(ReconcileUserRequest::new(id))
                        .handle(|dto| async move { module.reconcile_user(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
