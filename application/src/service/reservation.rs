use error_stack::Report;
use kernel::interface::config::{Clock, DependOnClock, DependOnLendingPolicy};
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::job::{DependOnPendingUpdateQueue, PendingUpdate};
use kernel::interface::query::{
    BookQuery, DependOnBookQuery, DependOnReservationQuery, DependOnUserQuery, ReservationQuery,
    UserQuery,
};
use kernel::interface::update::{
    DependOnLoanModifier, DependOnReservationModifier, DependOnUserModifier, LoanModifier,
    ReservationModifier, UserModifier,
};
use kernel::prelude::entity::{
    has_active_reservation, BookId, Loan, LoanId, PickupCode, Reservation, ReservationId,
    ReservationStatus, UserId,
};
use kernel::{KernelError, Precondition};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::service::{defer, not_found, ReleaseCopyService};
use crate::transfer::{
    BorrowFromReservationDto, BorrowResultDto, CancelReservationDto, CancelResultDto,
    ExpireReservationsDto, ExpireResultDto, LoanDto, ReleaseOutcome, ReservationDto, ReserveDto,
};

fn ensure_owner(reservation: &Reservation, user_id: &UserId) -> error_stack::Result<(), KernelError> {
    if reservation.user_id() != user_id {
        return Err(Report::new(KernelError::Forbidden).attach_printable(format!(
            "reservation {:?} belongs to another user",
            reservation.id()
        )));
    }
    Ok(())
}

#[async_trait::async_trait]
pub trait ReserveService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnLendingPolicy
    + DependOnDatabaseConnection
    + DependOnBookQuery
    + DependOnUserQuery
    + DependOnReservationQuery
    + DependOnReservationModifier
{
    /// Joins the book's queue whether or not a copy is on the shelf.
    #[tracing::instrument(skip_all, fields(book_id = %dto.book_id, user_id = %dto.user_id))]
    async fn reserve(&self, dto: ReserveDto) -> error_stack::Result<ReservationDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let book_id = BookId::new(dto.book_id);
        let user_id = UserId::new(dto.user_id);

        let user = self
            .user_query()
            .find_by_id(&mut con, &user_id)
            .await?
            .ok_or_else(|| not_found("user", &user_id))?;
        if !*user.active().as_ref() {
            return Err(Report::new(KernelError::from(Precondition::AccountInactive)));
        }
        let book = self
            .book_query()
            .find_by_id(&mut con, &book_id)
            .await?
            .ok_or_else(|| not_found("book", &book_id))?;

        let queue = self
            .reservation_query()
            .find_by_book_id(&mut con, &book_id)
            .await?;
        if has_active_reservation(&queue, &user_id) {
            return Err(Report::new(KernelError::from(Precondition::DuplicateReservation)));
        }

        let now = self.clock().now();
        let reservation = Reservation::enqueue(
            ReservationId::new(Uuid::new_v4()),
            &book,
            &user,
            now,
            *self.lending_policy().reservation_hold(),
        );
        self.reservation_modifier()
            .create(&mut con, &reservation)
            .await?;
        info!(reservation_id = ?reservation.id(), "Reservation created");

        Ok(ReservationDto::new(reservation, now))
    }
}

impl<T> ReserveService for T where
    T: DependOnClock
        + DependOnLendingPolicy
        + DependOnDatabaseConnection
        + DependOnBookQuery
        + DependOnUserQuery
        + DependOnReservationQuery
        + DependOnReservationModifier
{
}

#[async_trait::async_trait]
pub trait BorrowFromReservationService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnDatabaseConnection
    + DependOnBookQuery
    + DependOnUserQuery
    + DependOnReservationQuery
    + DependOnReservationModifier
    + DependOnLoanModifier
    + DependOnUserModifier
    + DependOnPendingUpdateQueue
{
    /// Same as a borrow, except the copy is already off the shelf: it was taken when the
    /// reservation became ready, so availability is left alone.
    #[tracing::instrument(skip_all, fields(reservation_id = %dto.reservation_id, user_id = %dto.user_id))]
    async fn borrow_from_reservation(
        &self,
        dto: BorrowFromReservationDto,
    ) -> error_stack::Result<BorrowResultDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let reservation_id = ReservationId::new(dto.reservation_id);
        let user_id = UserId::new(dto.user_id);

        let mut reservation = self
            .reservation_query()
            .find_by_id(&mut con, &reservation_id)
            .await?
            .ok_or_else(|| not_found("reservation", &reservation_id))?;
        ensure_owner(&reservation, &user_id)?;

        let now = self.clock().now();
        reservation.ensure_can_complete(now)?;

        let user = self
            .user_query()
            .find_by_id(&mut con, &user_id)
            .await?
            .ok_or_else(|| not_found("user", &user_id))?;
        user.ensure_can_borrow()?;
        let book = self
            .book_query()
            .find_by_id(&mut con, reservation.book_id())
            .await?
            .ok_or_else(|| not_found("book", reservation.book_id()))?;

        let loan = Loan::open(
            LoanId::new(Uuid::new_v4()),
            &book,
            &user,
            PickupCode::generate(),
            now,
        );
        self.loan_modifier().create(&mut con, &loan).await?;
        info!(loan_id = ?loan.id(), "Loan created from reservation");

        let mut deferred = Vec::new();
        let completed = match reservation.complete(now) {
            Ok(()) => {
                self.reservation_modifier()
                    .update(&mut con, &reservation, &ReservationStatus::Ready)
                    .await
            }
            Err(report) => Err(report),
        };
        if let Err(report) = completed {
            let update = PendingUpdate::CompleteReservation { reservation_id };
            defer(self.pending_update_queue(), &mut deferred, update, report).await;
        }
        if let Err(report) = self
            .user_modifier()
            .increment_loans(&mut con, &user_id)
            .await
        {
            let update = PendingUpdate::IncrementUserLoans { user_id };
            defer(self.pending_update_queue(), &mut deferred, update, report).await;
        }

        Ok(BorrowResultDto {
            loan: LoanDto::new(loan, now),
            deferred,
        })
    }
}

impl<T> BorrowFromReservationService for T where
    T: DependOnClock
        + DependOnDatabaseConnection
        + DependOnBookQuery
        + DependOnUserQuery
        + DependOnReservationQuery
        + DependOnReservationModifier
        + DependOnLoanModifier
        + DependOnUserModifier
        + DependOnPendingUpdateQueue
{
}

#[async_trait::async_trait]
pub trait CancelReservationService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnDatabaseConnection
    + DependOnReservationQuery
    + DependOnReservationModifier
    + DependOnPendingUpdateQueue
    + ReleaseCopyService
{
    /// A cancelled `ready` reservation gives its copy back exactly as a return would.
    /// A `pending` one never held a copy.
    #[tracing::instrument(skip_all, fields(reservation_id = %dto.reservation_id, user_id = %dto.user_id))]
    async fn cancel_reservation(
        &self,
        dto: CancelReservationDto,
    ) -> error_stack::Result<CancelResultDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let reservation_id = ReservationId::new(dto.reservation_id);
        let user_id = UserId::new(dto.user_id);

        let mut reservation = self
            .reservation_query()
            .find_by_id(&mut con, &reservation_id)
            .await?
            .ok_or_else(|| not_found("reservation", &reservation_id))?;
        ensure_owner(&reservation, &user_id)?;

        let previous = reservation.cancel()?;
        self.reservation_modifier()
            .update(&mut con, &reservation, &previous)
            .await?;
        info!(previous = previous.as_str(), "Reservation cancelled");

        let mut deferred = Vec::new();
        let release = if previous == ReservationStatus::Ready {
            let book_id = reservation.book_id().clone();
            let outcome = match self.release_copy(&mut con, &book_id).await {
                Ok(outcome) => outcome,
                Err(report) => {
                    let update = PendingUpdate::ReleaseCopy { book_id };
                    defer(self.pending_update_queue(), &mut deferred, update, report).await;
                    ReleaseOutcome::Deferred
                }
            };
            Some(outcome)
        } else {
            None
        };

        Ok(CancelResultDto {
            reservation: ReservationDto::new(reservation, self.clock().now()),
            release,
            deferred,
        })
    }
}

impl<T> CancelReservationService for T where
    T: DependOnClock
        + DependOnDatabaseConnection
        + DependOnReservationQuery
        + DependOnReservationModifier
        + DependOnPendingUpdateQueue
        + ReleaseCopyService
{
}

#[async_trait::async_trait]
pub trait ExpireReservationsService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnDatabaseConnection
    + DependOnReservationQuery
    + DependOnReservationModifier
    + DependOnPendingUpdateQueue
    + ReleaseCopyService
{
    /// Sweeps `ready` reservations whose window has passed and frees their copies.
    #[tracing::instrument(skip_all, fields(book_id = %dto.book_id))]
    async fn expire_ready(
        &self,
        dto: ExpireReservationsDto,
    ) -> error_stack::Result<ExpireResultDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let book_id = BookId::new(dto.book_id);
        let now = self.clock().now();

        let candidates = self
            .reservation_query()
            .find_by_book_id(&mut con, &book_id)
            .await?
            .into_iter()
            .filter(|reservation| reservation.is_expired(now))
            .collect::<Vec<_>>();

        let mut expired = Vec::new();
        let mut releases = Vec::new();
        let mut deferred = Vec::new();
        let mut skipped = Vec::new();
        for mut reservation in candidates {
            reservation.expire(now)?;
            match self
                .reservation_modifier()
                .update(&mut con, &reservation, &ReservationStatus::Ready)
                .await
            {
                Ok(()) => {}
                Err(report) if report.current_context().is_conflict() => {
                    debug!(reservation_id = ?reservation.id(), "Reservation moved on before expiry");
                    continue;
                }
                Err(report) => {
                    error!(reservation_id = ?reservation.id(), "Failed to expire reservation: {report:?}");
                    skipped.push(*reservation.id().as_ref());
                    continue;
                }
            }
            info!(reservation_id = ?reservation.id(), "Reservation expired");

            let outcome = match self.release_copy(&mut con, &book_id).await {
                Ok(outcome) => outcome,
                Err(report) => {
                    let update = PendingUpdate::ReleaseCopy {
                        book_id: book_id.clone(),
                    };
                    defer(self.pending_update_queue(), &mut deferred, update, report).await;
                    ReleaseOutcome::Deferred
                }
            };
            releases.push(outcome);
            expired.push(ReservationDto::new(reservation, now));
        }

        Ok(ExpireResultDto {
            expired,
            releases,
            deferred,
            skipped,
        })
    }
}

impl<T> ExpireReservationsService for T where
    T: DependOnClock
        + DependOnDatabaseConnection
        + DependOnReservationQuery
        + DependOnReservationModifier
        + DependOnPendingUpdateQueue
        + ReleaseCopyService
{
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::service::fixture::{available, book, current_loans, user, user_with};
    use crate::service::{ApplyPendingUpdateService, BorrowService, ConfirmPickupService, ReturnService};
    use crate::transfer::{BorrowDto, ConfirmPickupDto, ReturnLoanDto};
    use driver::database::{InMemoryDatabase, StoreOperation};
    use kernel::interface::query::{DependOnLoanQuery, LoanQuery};
    use time::Duration;

    /// A single-copy book lent to a fresh user and already picked up.
    async fn lent_out(db: &InMemoryDatabase) -> error_stack::Result<(Uuid, Uuid), KernelError> {
        let book_id = book(db, 1, 1).await;
        let holder = user(db, "Leto").await;
        let borrowed = db
            .borrow(BorrowDto {
                book_id,
                user_id: holder,
            })
            .await?;
        let loan = db
            .confirm_pickup(ConfirmPickupDto {
                pickup_code: borrowed.loan.pickup_code,
            })
            .await?;
        Ok((book_id, loan.id))
    }

    async fn status(db: &InMemoryDatabase, id: Uuid) -> String {
        db.reservation(&ReservationId::new(id))
            .await
            .map(|reservation| reservation.status().as_str().to_string())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn returned_copy_goes_to_the_queue() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let waiting = user(&db, "Paul").await;

        let reservation = db
            .reserve(ReserveDto {
                book_id,
                user_id: waiting,
            })
            .await?;
        assert_eq!(reservation.status, "pending");
        assert_eq!(reservation.notified_at, None);

        let returned = db.return_loan(ReturnLoanDto { loan_id }).await?;
        assert_eq!(
            returned.release,
            ReleaseOutcome::HandedToReservation {
                reservation_id: reservation.id
            }
        );
        assert_eq!(available(&db, book_id).await, 0);
        assert_eq!(status(&db, reservation.id).await, "ready");

        let borrowed = db
            .borrow_from_reservation(BorrowFromReservationDto {
                reservation_id: reservation.id,
                user_id: waiting,
            })
            .await?;
        assert!(!borrowed.is_degraded());
        assert_eq!(borrowed.loan.status, "pending_pickup");
        assert_eq!(status(&db, reservation.id).await, "completed");
        assert_eq!(available(&db, book_id).await, 0);
        assert_eq!(current_loans(&db, waiting).await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn queue_is_first_come_first_served() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let first = user(&db, "Paul").await;
        let second = user(&db, "Chani").await;

        let early = db
            .reserve(ReserveDto {
                book_id,
                user_id: first,
            })
            .await?;
        db.clock().advance(Duration::minutes(1));
        let late = db
            .reserve(ReserveDto {
                book_id,
                user_id: second,
            })
            .await?;

        db.return_loan(ReturnLoanDto { loan_id }).await?;
        assert_eq!(status(&db, early.id).await, "ready");
        assert_eq!(status(&db, late.id).await, "pending");
        Ok(())
    }

    #[tokio::test]
    async fn lost_mark_ready_race_returns_copy_to_pool() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let waiting = user(&db, "Paul").await;
        let reservation = db
            .reserve(ReserveDto {
                book_id,
                user_id: waiting,
            })
            .await?;
        db.fail_next(StoreOperation::UpdateReservation, KernelError::Conflict)
            .await;

        let returned = db.return_loan(ReturnLoanDto { loan_id }).await?;
        assert_eq!(returned.release, ReleaseOutcome::ReturnedToPool { moved: true });
        assert!(returned.deferred.is_empty());
        assert_eq!(available(&db, book_id).await, 1);
        assert_eq!(status(&db, reservation.id).await, "pending");
        Ok(())
    }

    #[tokio::test]
    async fn unclear_mark_ready_failure_defers_the_release() -> error_stack::Result<(), KernelError>
    {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let waiting = user(&db, "Paul").await;
        let reservation = db
            .reserve(ReserveDto {
                book_id,
                user_id: waiting,
            })
            .await?;
        db.fail_next(StoreOperation::UpdateReservation, KernelError::StoreUnavailable)
            .await;

        let returned = db.return_loan(ReturnLoanDto { loan_id }).await?;
        assert_eq!(returned.release, ReleaseOutcome::Deferred);
        assert_eq!(
            returned.deferred,
            vec![PendingUpdate::ReleaseCopy {
                book_id: BookId::new(book_id)
            }]
        );
        assert_eq!(available(&db, book_id).await, 0);
        assert_eq!(status(&db, reservation.id).await, "pending");

        for update in db.pending_update_queue().take_all().await {
            db.apply_pending_update(update).await?;
        }
        assert_eq!(status(&db, reservation.id).await, "ready");
        assert_eq!(available(&db, book_id).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn one_active_reservation_per_user_and_book() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Paul").await;

        let reservation = db.reserve(ReserveDto { book_id, user_id }).await?;
        let report = db.reserve(ReserveDto { book_id, user_id }).await.unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::DuplicateReservation)
        );

        let cancelled = db
            .cancel_reservation(CancelReservationDto {
                reservation_id: reservation.id,
                user_id,
            })
            .await?;
        assert_eq!(cancelled.reservation.status, "cancelled");
        assert_eq!(cancelled.release, None);
        assert_eq!(available(&db, book_id).await, 1);

        db.reserve(ReserveDto { book_id, user_id }).await?;

        let inactive = user_with(&db, 5, 0, false).await;
        let report = db
            .reserve(ReserveDto {
                book_id,
                user_id: inactive,
            })
            .await
            .unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::AccountInactive)
        );
        Ok(())
    }

    #[tokio::test]
    async fn strangers_cannot_touch_a_reservation() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let owner = user(&db, "Paul").await;
        let stranger = user(&db, "Feyd").await;
        let reservation = db
            .reserve(ReserveDto {
                book_id,
                user_id: owner,
            })
            .await?;
        db.return_loan(ReturnLoanDto { loan_id }).await?;

        let report = db
            .borrow_from_reservation(BorrowFromReservationDto {
                reservation_id: reservation.id,
                user_id: stranger,
            })
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Forbidden);
        let report = db
            .cancel_reservation(CancelReservationDto {
                reservation_id: reservation.id,
                user_id: stranger,
            })
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Forbidden);
        assert_eq!(status(&db, reservation.id).await, "ready");
        Ok(())
    }

    #[tokio::test]
    async fn cancelling_a_ready_reservation_passes_the_copy_on() -> error_stack::Result<(), KernelError>
    {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let first = user(&db, "Paul").await;
        let second = user(&db, "Chani").await;
        let ready = db
            .reserve(ReserveDto {
                book_id,
                user_id: first,
            })
            .await?;
        db.clock().advance(Duration::minutes(1));
        let next = db
            .reserve(ReserveDto {
                book_id,
                user_id: second,
            })
            .await?;
        db.return_loan(ReturnLoanDto { loan_id }).await?;

        let cancelled = db
            .cancel_reservation(CancelReservationDto {
                reservation_id: ready.id,
                user_id: first,
            })
            .await?;
        assert_eq!(
            cancelled.release,
            Some(ReleaseOutcome::HandedToReservation {
                reservation_id: next.id
            })
        );
        assert_eq!(status(&db, next.id).await, "ready");
        assert_eq!(available(&db, book_id).await, 0);

        let cancelled = db
            .cancel_reservation(CancelReservationDto {
                reservation_id: next.id,
                user_id: second,
            })
            .await?;
        assert_eq!(
            cancelled.release,
            Some(ReleaseOutcome::ReturnedToPool { moved: true })
        );
        assert_eq!(available(&db, book_id).await, 1);

        let report = db
            .cancel_reservation(CancelReservationDto {
                reservation_id: next.id,
                user_id: second,
            })
            .await
            .unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::ReservationWrongState)
        );
        Ok(())
    }

    #[tokio::test]
    async fn lapsed_ready_window_frees_the_copy() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let waiting = user(&db, "Paul").await;
        let reservation = db
            .reserve(ReserveDto {
                book_id,
                user_id: waiting,
            })
            .await?;
        db.return_loan(ReturnLoanDto { loan_id }).await?;

        let swept = db.expire_ready(ExpireReservationsDto { book_id }).await?;
        assert!(swept.expired.is_empty());

        db.clock().advance(Duration::days(3) + Duration::seconds(1));
        let report = db
            .borrow_from_reservation(BorrowFromReservationDto {
                reservation_id: reservation.id,
                user_id: waiting,
            })
            .await
            .unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::ReservationExpired)
        );

        let swept = db.expire_ready(ExpireReservationsDto { book_id }).await?;
        assert_eq!(swept.expired.len(), 1);
        assert_eq!(swept.expired[0].status, "expired");
        assert_eq!(
            swept.releases,
            vec![ReleaseOutcome::ReturnedToPool { moved: true }]
        );
        assert_eq!(available(&db, book_id).await, 1);
        assert_eq!(current_loans(&db, waiting).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn completion_is_repaired_from_the_queue() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let (book_id, loan_id) = lent_out(&db).await?;
        let waiting = user(&db, "Paul").await;
        let reservation = db
            .reserve(ReserveDto {
                book_id,
                user_id: waiting,
            })
            .await?;
        db.return_loan(ReturnLoanDto { loan_id }).await?;
        db.fail_next(StoreOperation::UpdateReservation, KernelError::StoreUnavailable)
            .await;

        let borrowed = db
            .borrow_from_reservation(BorrowFromReservationDto {
                reservation_id: reservation.id,
                user_id: waiting,
            })
            .await?;
        assert_eq!(
            borrowed.deferred,
            vec![PendingUpdate::CompleteReservation {
                reservation_id: ReservationId::new(reservation.id)
            }]
        );
        assert_eq!(status(&db, reservation.id).await, "ready");

        // Applying twice lands once
        let updates = db.pending_update_queue().take_all().await;
        for update in updates.iter().chain(updates.iter()) {
            db.apply_pending_update(update.clone()).await?;
        }
        assert_eq!(status(&db, reservation.id).await, "completed");
        assert_eq!(available(&db, book_id).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn sweep_reports_expiries_written_before_a_failure() -> error_stack::Result<(), KernelError>
    {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 2, 2).await;
        let mut reservations = Vec::new();
        for (holder, waiting) in [("Leto", "Paul"), ("Jessica", "Chani")] {
            let holder = user(&db, holder).await;
            let borrowed = db
                .borrow(BorrowDto {
                    book_id,
                    user_id: holder,
                })
                .await?;
            let loan = db
                .confirm_pickup(ConfirmPickupDto {
                    pickup_code: borrowed.loan.pickup_code,
                })
                .await?;
            let waiting = user(&db, waiting).await;
            let reservation = db
                .reserve(ReserveDto {
                    book_id,
                    user_id: waiting,
                })
                .await?;
            db.return_loan(ReturnLoanDto { loan_id: loan.id }).await?;
            reservations.push(reservation.id);
        }
        for id in &reservations {
            assert_eq!(status(&db, *id).await, "ready");
        }
        assert_eq!(available(&db, book_id).await, 0);

        db.clock().advance(Duration::days(3) + Duration::seconds(1));
        db.fail_after(StoreOperation::UpdateReservation, 1, KernelError::StoreUnavailable)
            .await;

        let swept = db.expire_ready(ExpireReservationsDto { book_id }).await?;
        assert_eq!(swept.expired.len(), 1);
        assert_eq!(swept.skipped.len(), 1);
        assert_eq!(
            swept.releases,
            vec![ReleaseOutcome::ReturnedToPool { moved: true }]
        );
        assert_eq!(status(&db, swept.expired[0].id).await, "expired");
        assert_eq!(status(&db, swept.skipped[0]).await, "ready");
        assert_eq!(available(&db, book_id).await, 1);

        let swept = db.expire_ready(ExpireReservationsDto { book_id }).await?;
        assert_eq!(swept.expired.len(), 1);
        assert!(swept.skipped.is_empty());
        assert_eq!(available(&db, book_id).await, 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_returns_share_one_pending_reservation(
    ) -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 2, 2).await;
        let mut loans = Vec::new();
        for holder in ["Leto", "Jessica"] {
            let holder = user(&db, holder).await;
            let borrowed = db
                .borrow(BorrowDto {
                    book_id,
                    user_id: holder,
                })
                .await?;
            let loan = db
                .confirm_pickup(ConfirmPickupDto {
                    pickup_code: borrowed.loan.pickup_code,
                })
                .await?;
            loans.push(loan.id);
        }
        let waiting = user(&db, "Paul").await;
        let reservation = db
            .reserve(ReserveDto {
                book_id,
                user_id: waiting,
            })
            .await?;

        let returns = loans
            .into_iter()
            .map(|loan_id| {
                let db = db.clone();
                tokio::spawn(async move { db.return_loan(ReturnLoanDto { loan_id }).await })
            })
            .collect::<Vec<_>>();
        let mut releases = Vec::new();
        for handle in returns {
            let returned = handle.await.map_err(|error| {
                Report::new(KernelError::Internal).attach_printable(error.to_string())
            })??;
            assert!(returned.deferred.is_empty());
            releases.push(returned.release);
        }

        let handed = releases
            .iter()
            .filter(|release| matches!(release, ReleaseOutcome::HandedToReservation { .. }))
            .count();
        let pooled = releases
            .iter()
            .filter(|release| **release == ReleaseOutcome::ReturnedToPool { moved: true })
            .count();
        assert_eq!((handed, pooled), (1, 1));
        assert_eq!(status(&db, reservation.id).await, "ready");

        // Every copy is on the shelf, held for a reservation, or out on a loan
        let mut con = db.acquire().await?;
        let ready = db
            .reservation_query()
            .find_by_book_id(&mut con, &BookId::new(book_id))
            .await?
            .iter()
            .filter(|reservation| reservation.status() == &ReservationStatus::Ready)
            .count();
        let outstanding = db
            .loan_query()
            .find_by_book_id(&mut con, &BookId::new(book_id))
            .await?
            .iter()
            .filter(|loan| loan.status().is_outstanding())
            .count();
        let held = i32::try_from(ready + outstanding).unwrap();
        assert_eq!(available(&db, book_id).await + held, 2);
        Ok(())
    }
}
