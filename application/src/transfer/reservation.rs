use kernel::interface::job::PendingUpdate;
use kernel::prelude::entity::{DestructReservation, Reservation};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReservationDto {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub book_title: String,
    pub user_name: String,
    pub status: String,
    pub reserved_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub notified_at: Option<OffsetDateTime>,
    pub days_until_expiry: i64,
}

impl ReservationDto {
    pub fn new(reservation: Reservation, now: OffsetDateTime) -> Self {
        let days_until_expiry = reservation.days_until_expiry(now);
        let DestructReservation {
            id,
            book_id,
            user_id,
            book_title,
            user_name,
            status,
            reserved_at,
            expires_at,
            notified_at,
        } = reservation.into_destruct();
        Self {
            id: id.into(),
            book_id: book_id.into(),
            user_id: user_id.into(),
            book_title: book_title.into(),
            user_name: user_name.into(),
            status: status.as_str().to_string(),
            reserved_at: *reserved_at.as_ref(),
            expires_at: expires_at.into(),
            notified_at: notified_at.map(Into::into),
            days_until_expiry,
        }
    }
}

/// Where a freed copy ended up.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReleaseOutcome {
    /// Earmarked for the oldest pending reservation, which is now `ready`.
    HandedToReservation { reservation_id: Uuid },
    /// Back on the shelf. `moved` is false when the counter was already at `total_copies`.
    ReturnedToPool { moved: bool },
    /// Neither path could be written; a `ReleaseCopy` update was queued.
    Deferred,
}

#[derive(Debug, Clone)]
pub struct CancelResultDto {
    pub reservation: ReservationDto,
    pub release: Option<ReleaseOutcome>,
    pub deferred: Vec<PendingUpdate>,
}

#[derive(Debug, Clone)]
pub struct ExpireResultDto {
    pub expired: Vec<ReservationDto>,
    pub releases: Vec<ReleaseOutcome>,
    pub deferred: Vec<PendingUpdate>,
    /// Lapsed reservations whose expiry could not be written; the next sweep picks them up.
    pub skipped: Vec<Uuid>,
}

pub struct ReserveDto {
    pub book_id: Uuid,
    pub user_id: Uuid,
}

pub struct BorrowFromReservationDto {
    pub reservation_id: Uuid,
    pub user_id: Uuid,
}

pub struct CancelReservationDto {
    pub reservation_id: Uuid,
    pub user_id: Uuid,
}

pub struct ExpireReservationsDto {
    pub book_id: Uuid,
}

pub struct GetUserReservationsDto {
    pub user_id: Uuid,
}
