use crate::controller::Exhaust;
use crate::response::ReleaseResponse;
use application::transfer::{CancelResultDto, ExpireResultDto, ReservationDto};
use axum::http::StatusCode;
use axum::Json;
use kernel::interface::job::PendingUpdate;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ReservationResponse {
    id: Uuid,
    book_id: Uuid,
    user_id: Uuid,
    book_title: String,
    user_name: String,
    status: String,
    #[serde(with = "time::serde::rfc3339")]
    reserved_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    notified_at: Option<OffsetDateTime>,
    days_until_expiry: i64,
}

impl From<ReservationDto> for ReservationResponse {
    fn from(dto: ReservationDto) -> Self {
        Self {
            id: dto.id,
            book_id: dto.book_id,
            user_id: dto.user_id,
            book_title: dto.book_title,
            user_name: dto.user_name,
            status: dto.status,
            reserved_at: dto.reserved_at,
            expires_at: dto.expires_at,
            notified_at: dto.notified_at,
            days_until_expiry: dto.days_until_expiry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    reservation: ReservationResponse,
    release: Option<ReleaseResponse>,
    deferred: Vec<PendingUpdate>,
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    expired: Vec<ReservationResponse>,
    releases: Vec<ReleaseResponse>,
    deferred: Vec<PendingUpdate>,
    skipped: Vec<Uuid>,
}

pub struct ReservationPresenter;

impl Exhaust<ReservationDto> for ReservationPresenter {
    type To = (StatusCode, Json<ReservationResponse>);
    fn emit(&self, input: ReservationDto) -> Self::To {
        (StatusCode::CREATED, Json(input.into()))
    }
}

impl Exhaust<Vec<ReservationDto>> for ReservationPresenter {
    type To = Json<Vec<ReservationResponse>>;
    fn emit(&self, input: Vec<ReservationDto>) -> Self::To {
        Json(input.into_iter().map(ReservationResponse::from).collect())
    }
}

impl Exhaust<CancelResultDto> for ReservationPresenter {
    type To = Json<CancelResponse>;
    fn emit(&self, input: CancelResultDto) -> Self::To {
        Json(CancelResponse {
            reservation: input.reservation.into(),
            release: input.release.map(Into::into),
            deferred: input.deferred,
        })
    }
}

impl Exhaust<ExpireResultDto> for ReservationPresenter {
    type To = Json<ExpireResponse>;
    fn emit(&self, input: ExpireResultDto) -> Self::To {
        Json(ExpireResponse {
            expired: input.expired.into_iter().map(Into::into).collect(),
            releases: input.releases.into_iter().map(Into::into).collect(),
            deferred: input.deferred,
            skipped: input.skipped,
        })
    }
}
