use crate::controller::{Controller, Exhaust};
use crate::error::ErrorStatus;
use crate::handler::AppModule;
use crate::request::{ConfirmPickupRequest, LoanTransformer, ReturnLoanRequest};
use crate::response::LoanPresenter;
use application::service::{
    ConfirmPickupService, ListOverdueLoansService, ListPendingPickupsService, ReturnService,
};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

pub trait LoanRouter {
    fn route_loan(self) -> Self;
}

impl LoanRouter for Router<AppModule> {
    fn route_loan(self) -> Self {
        self.route(
            "/loans/pickup",
            post(
                |State(module): State<AppModule>, Json(req): Json<ConfirmPickupRequest>| async move {
                    Controller::new(LoanTransformer, LoanPresenter)
                        .intake(req)
                        .handle(|dto| async move { module.confirm_pickup(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
        .route(
            "/loans/overdue",
            get(|State(module): State<AppModule>| async move {
                module
                    .list_overdue_loans()
                    .await
                    .map(|loans| LoanPresenter.emit(loans))
                    .map_err(ErrorStatus::from)
            }),
        )
        .route(
            "/loans/overdue/count",
            get(|State(module): State<AppModule>| async move {
                module
                    .count_overdue_loans()
                    .await
                    .map(|count| LoanPresenter.emit(count))
                    .map_err(ErrorStatus::from)
            }),
        )
        .route(
            "/loans/pending-pickup",
            get(|State(module): State<AppModule>| async move {
                module
                    .list_pending_pickups()
                    .await
                    .map(|loans| LoanPresenter.emit(loans))
                    .map_err(ErrorStatus::from)
            }),
        )
        .route(
            "/loans/:id/return",
            post(
                |State(module): State<AppModule>, Path(id): Path<Uuid>| async move {
                    Controller::new(LoanTransformer, LoanPresenter)
                        .intake(ReturnLoanRequest::new(id))
                        .handle(|dto| async move { module.return_loan(dto).await })
                        .await
                        .map_err(ErrorStatus::from)
                },
            ),
        )
    }
}
