use crate::controller::Exhaust;
use application::transfer::{BorrowResultDto, LoanDto, ReleaseOutcome, ReturnResultDto};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kernel::interface::job::PendingUpdate;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct LoanResponse {
    id: Uuid,
    book_id: Uuid,
    user_id: Uuid,
    book_title: String,
    user_name: String,
    pickup_code: String,
    status: String,
    #[serde(with = "time::serde::rfc3339")]
    loaned_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    due_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    returned_at: Option<OffsetDateTime>,
    fine: i64,
    days_until_due: i64,
}

impl From<LoanDto> for LoanResponse {
    fn from(dto: LoanDto) -> Self {
        Self {
            id: dto.id,
            book_id: dto.book_id,
            user_id: dto.user_id,
            book_title: dto.book_title,
            user_name: dto.user_name,
            pickup_code: dto.pickup_code,
            status: dto.status,
            loaned_at: dto.loaned_at,
            due_date: dto.due_date,
            returned_at: dto.returned_at,
            fine: dto.fine,
            days_until_due: dto.days_until_due,
        }
    }
}

impl IntoResponse for LoanResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "to", rename_all = "snake_case")]
pub enum ReleaseResponse {
    Reservation { reservation_id: Uuid },
    Pool { moved: bool },
    Deferred,
}

impl From<ReleaseOutcome> for ReleaseResponse {
    fn from(outcome: ReleaseOutcome) -> Self {
        match outcome {
            ReleaseOutcome::HandedToReservation { reservation_id } => {
                ReleaseResponse::Reservation { reservation_id }
            }
            ReleaseOutcome::ReturnedToPool { moved } => ReleaseResponse::Pool { moved },
            ReleaseOutcome::Deferred => ReleaseResponse::Deferred,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BorrowResponse {
    loan: LoanResponse,
    deferred: Vec<PendingUpdate>,
}

impl IntoResponse for BorrowResponse {
    fn into_response(self) -> Response {
        let status = if self.deferred.is_empty() {
            StatusCode::CREATED
        } else {
            StatusCode::ACCEPTED
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ReturnResponse {
    loan: LoanResponse,
    fine: i64,
    release: ReleaseResponse,
    deferred: Vec<PendingUpdate>,
}

impl IntoResponse for ReturnResponse {
    fn into_response(self) -> Response {
        let status = if self.deferred.is_empty() {
            StatusCode::OK
        } else {
            StatusCode::ACCEPTED
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct LoanCountResponse {
    count: usize,
}

pub struct LoanPresenter;

impl Exhaust<LoanDto> for LoanPresenter {
    type To = LoanResponse;
    fn emit(&self, input: LoanDto) -> Self::To {
        LoanResponse::from(input)
    }
}

impl Exhaust<Vec<LoanDto>> for LoanPresenter {
    type To = Json<Vec<LoanResponse>>;
    fn emit(&self, input: Vec<LoanDto>) -> Self::To {
        Json(input.into_iter().map(LoanResponse::from).collect())
    }
}

impl Exhaust<usize> for LoanPresenter {
    type To = Json<LoanCountResponse>;
    fn emit(&self, count: usize) -> Self::To {
        Json(LoanCountResponse { count })
    }
}

impl Exhaust<BorrowResultDto> for LoanPresenter {
    type To = BorrowResponse;
    fn emit(&self, input: BorrowResultDto) -> Self::To {
        BorrowResponse {
            loan: input.loan.into(),
            deferred: input.deferred,
        }
    }
}

impl Exhaust<ReturnResultDto> for LoanPresenter {
    type To = ReturnResponse;
    fn emit(&self, input: ReturnResultDto) -> Self::To {
        ReturnResponse {
            loan: input.loan.into(),
            fine: input.fine,
            release: input.release.into(),
            deferred: input.deferred,
        }
    }
}
