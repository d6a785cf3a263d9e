mod dates;
mod id;
mod status;

pub use self::{dates::*, id::*, status::*};
use crate::entity::{
    whole_days_between, Book, BookId, BookTitle, CreatedAt, User, UserId, UserName,
};
use crate::{KernelError, Precondition};
use destructure::{Destructure, Mutation};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use vodca::References;

/// A place in a book's queue. `pending -> ready -> completed | expired`, and
/// `pending | ready -> cancelled`. A `ready` reservation holds a copy taken off the shelf.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure, Mutation)]
pub struct Reservation {
    id: ReservationId,
    book_id: BookId,
    user_id: UserId,
    book_title: BookTitle,
    user_name: UserName,
    status: ReservationStatus,
    reserved_at: CreatedAt<Reservation>,
    expires_at: ExpiresAt,
    notified_at: Option<NotifiedAt>,
}

impl Reservation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ReservationId,
        book_id: BookId,
        user_id: UserId,
        book_title: BookTitle,
        user_name: UserName,
        status: ReservationStatus,
        reserved_at: CreatedAt<Reservation>,
        expires_at: ExpiresAt,
        notified_at: Option<NotifiedAt>,
    ) -> Self {
        Self {
            id,
            book_id,
            user_id,
            book_title,
            user_name,
            status,
            reserved_at,
            expires_at,
            notified_at,
        }
    }

    /// Joins the queue. `hold` only sets a placeholder expiry; the real window starts at
    /// [`Reservation::mark_ready`].
    pub fn enqueue(
        id: ReservationId,
        book: &Book,
        user: &User,
        now: OffsetDateTime,
        hold: Duration,
    ) -> Self {
        Self::new(
            id,
            book.id().clone(),
            user.id().clone(),
            book.title().clone(),
            user.name().clone(),
            ReservationStatus::Pending,
            CreatedAt::new(now),
            ExpiresAt::new(now + hold),
            None,
        )
    }

    pub fn mark_ready(
        &mut self,
        now: OffsetDateTime,
        window: Duration,
    ) -> error_stack::Result<(), KernelError> {
        if self.status != ReservationStatus::Pending {
            return Err(self.wrong_state("mark ready"));
        }
        self.substitute(|reservation| {
            *reservation.status = ReservationStatus::Ready;
            *reservation.notified_at = Some(NotifiedAt::new(now));
            *reservation.expires_at = ExpiresAt::new(now + window);
        });
        Ok(())
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.status == ReservationStatus::Ready && now > *self.expires_at.as_ref()
    }

    pub fn ensure_can_complete(&self, now: OffsetDateTime) -> error_stack::Result<(), KernelError> {
        if self.status != ReservationStatus::Ready {
            return Err(Report::new(KernelError::from(Precondition::ReservationNotReady))
                .attach_printable(format!(
                    "reservation {:?} is {}",
                    self.id,
                    self.status.as_str()
                )));
        }
        if self.is_expired(now) {
            return Err(Report::new(KernelError::from(Precondition::ReservationExpired))
                .attach_printable(format!("reservation {:?} expired", self.id)));
        }
        Ok(())
    }

    pub fn complete(&mut self, now: OffsetDateTime) -> error_stack::Result<(), KernelError> {
        self.ensure_can_complete(now)?;
        self.substitute(|reservation| *reservation.status = ReservationStatus::Completed);
        Ok(())
    }

    /// Completion owed to a loan that already exists, so the window is not checked.
    /// `Ok(false)` when the reservation is already completed.
    pub fn settle(&mut self) -> error_stack::Result<bool, KernelError> {
        match self.status {
            ReservationStatus::Completed => Ok(false),
            ReservationStatus::Ready => {
                self.substitute(|reservation| *reservation.status = ReservationStatus::Completed);
                Ok(true)
            }
            _ => Err(self.wrong_state("settle")),
        }
    }

    /// Returns the status the reservation had, so the caller knows whether a copy was held.
    pub fn cancel(&mut self) -> error_stack::Result<ReservationStatus, KernelError> {
        let previous = self.status;
        match previous {
            ReservationStatus::Pending | ReservationStatus::Ready => {}
            ReservationStatus::Completed => {
                return Err(Report::new(KernelError::from(
                    Precondition::ReservationAlreadyCompleted,
                ))
                .attach_printable(format!("reservation {:?} is completed", self.id)))
            }
            ReservationStatus::Cancelled | ReservationStatus::Expired => {
                return Err(self.wrong_state("cancel"))
            }
        }
        self.substitute(|reservation| *reservation.status = ReservationStatus::Cancelled);
        Ok(previous)
    }

    pub fn expire(&mut self, now: OffsetDateTime) -> error_stack::Result<(), KernelError> {
        if !self.is_expired(now) {
            return Err(self.wrong_state("expire"));
        }
        self.substitute(|reservation| *reservation.status = ReservationStatus::Expired);
        Ok(())
    }

    pub fn days_until_expiry(&self, now: OffsetDateTime) -> i64 {
        if self.status != ReservationStatus::Ready {
            return 0;
        }
        whole_days_between(now, *self.expires_at.as_ref()).max(0)
    }

    fn wrong_state(&self, action: &str) -> Report<KernelError> {
        Report::new(KernelError::from(Precondition::ReservationWrongState)).attach_printable(
            format!(
                "cannot {action} reservation {:?} in state {}",
                self.id,
                self.status.as_str()
            ),
        )
    }
}

/// The oldest `pending` reservation, ties broken by id. Strict FIFO over whatever the store
/// returned for one book.
pub fn next_pending<'a, I>(reservations: I) -> Option<&'a Reservation>
where
    I: IntoIterator<Item = &'a Reservation>,
{
    reservations
        .into_iter()
        .filter(|reservation| reservation.status == ReservationStatus::Pending)
        .min_by(|a, b| {
            a.reserved_at
                .as_ref()
                .cmp(b.reserved_at.as_ref())
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Whether `user_id` already queues for or holds this book.
pub fn has_active_reservation<'a, I>(reservations: I, user_id: &UserId) -> bool
where
    I: IntoIterator<Item = &'a Reservation>,
{
    reservations
        .into_iter()
        .any(|reservation| &reservation.user_id == user_id && reservation.status.is_active())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entity::{AvailableCopies, TotalCopies};
    use time::macros::datetime;
    use uuid::Uuid;

    fn fixtures() -> (Book, User) {
        let book = Book::new(
            BookId::new(Uuid::new_v4()),
            BookTitle::new("Hyperion"),
            TotalCopies::new(1),
            AvailableCopies::new(0),
        );
        let user = User::register(UserId::new(Uuid::new_v4()), UserName::new("Sol"));
        (book, user)
    }

    fn reservation(at: OffsetDateTime) -> Reservation {
        let (book, user) = fixtures();
        Reservation::enqueue(
            ReservationId::new(Uuid::new_v4()),
            &book,
            &user,
            at,
            Duration::days(7),
        )
    }

    #[test]
    fn ready_window_starts_at_mark_ready() {
        let now = datetime!(2024-05-01 09:00 UTC);
        let mut reservation = reservation(now);
        assert_eq!(
            reservation.expires_at(),
            &ExpiresAt::new(datetime!(2024-05-08 09:00 UTC))
        );

        let later = datetime!(2024-05-02 09:00 UTC);
        reservation.mark_ready(later, Duration::days(3)).unwrap();
        assert_eq!(reservation.status(), &ReservationStatus::Ready);
        assert_eq!(
            reservation.expires_at(),
            &ExpiresAt::new(datetime!(2024-05-05 09:00 UTC))
        );
        assert_eq!(reservation.notified_at(), &Some(NotifiedAt::new(later)));
        assert_eq!(reservation.days_until_expiry(later), 3);

        let report = reservation.mark_ready(later, Duration::days(3)).unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::ReservationWrongState)
        );
    }

    #[test]
    fn completion_needs_a_live_ready_reservation() {
        let now = datetime!(2024-05-01 09:00 UTC);
        let mut reservation = reservation(now);
        let report = reservation.complete(now).unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::ReservationNotReady)
        );

        reservation.mark_ready(now, Duration::days(3)).unwrap();
        let late = now + Duration::days(3) + Duration::seconds(1);
        assert!(reservation.is_expired(late));
        let report = reservation.complete(late).unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::ReservationExpired)
        );

        reservation.complete(now + Duration::days(3)).unwrap();
        assert_eq!(reservation.status(), &ReservationStatus::Completed);
    }

    #[test]
    fn cancel_reports_the_previous_state() {
        let now = datetime!(2024-05-01 09:00 UTC);
        let mut pending = reservation(now);
        assert_eq!(pending.cancel().unwrap(), ReservationStatus::Pending);

        let mut ready = reservation(now);
        ready.mark_ready(now, Duration::days(3)).unwrap();
        assert_eq!(ready.cancel().unwrap(), ReservationStatus::Ready);

        let mut completed = reservation(now);
        completed.mark_ready(now, Duration::days(3)).unwrap();
        completed.complete(now).unwrap();
        let report = completed.cancel().unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::ReservationAlreadyCompleted)
        );
    }

    #[test]
    fn expire_only_after_the_window() {
        let now = datetime!(2024-05-01 09:00 UTC);
        let mut reservation = reservation(now);
        reservation.mark_ready(now, Duration::days(3)).unwrap();
        assert!(reservation.expire(now + Duration::days(1)).is_err());
        reservation.expire(now + Duration::days(4)).unwrap();
        assert_eq!(reservation.status(), &ReservationStatus::Expired);
    }

    #[test]
    fn next_pending_is_fifo() {
        let t1 = datetime!(2024-05-01 09:00 UTC);
        let mut first = reservation(t1);
        let second = reservation(t1 + Duration::minutes(1));
        let third = reservation(t1 + Duration::minutes(2));
        let queue = vec![third.clone(), first.clone(), second.clone()];

        assert_eq!(next_pending(&queue), Some(&first));

        first.mark_ready(t1, Duration::days(3)).unwrap();
        let queue = vec![third.clone(), first, second.clone()];
        assert_eq!(next_pending(&queue), Some(&second));

        assert_eq!(next_pending(&Vec::<Reservation>::new()), None);
    }

    #[test]
    fn active_reservations_are_detected_per_user() {
        let now = datetime!(2024-05-01 09:00 UTC);
        let mut reservation = reservation(now);
        let user_id = reservation.user_id().clone();
        assert!(has_active_reservation([&reservation], &user_id));

        reservation.cancel().unwrap();
        assert!(!has_active_reservation([&reservation], &user_id));
        assert!(!has_active_reservation(
            [&reservation],
            &UserId::new(Uuid::new_v4())
        ));
    }
}
