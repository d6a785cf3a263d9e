use error_stack::Report;
use kernel::interface::config::{Clock, DependOnClock, DependOnLendingPolicy};
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::job::{DependOnPendingUpdateQueue, PendingUpdate};
use kernel::interface::query::{
    BookQuery, DependOnBookQuery, DependOnLoanQuery, DependOnUserQuery, LoanQuery, UserQuery,
};
use kernel::interface::update::{
    BookModifier, DependOnBookModifier, DependOnLoanModifier, DependOnUserModifier, LoanModifier,
    UserModifier,
};
use kernel::prelude::entity::{BookId, Loan, LoanId, LoanStatus, PickupCode, UserId};
use kernel::{KernelError, Precondition};
use tracing::{debug, info};
use uuid::Uuid;

use crate::service::{defer, not_found, ReleaseCopyService};
use crate::transfer::{
    BorrowDto, BorrowResultDto, ConfirmPickupDto, LoanDto, ReleaseOutcome, ReturnLoanDto,
    ReturnResultDto,
};

#[async_trait::async_trait]
pub trait BorrowService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnDatabaseConnection
    + DependOnBookQuery
    + DependOnUserQuery
    + DependOnLoanModifier
    + DependOnBookModifier
    + DependOnUserModifier
    + DependOnPendingUpdateQueue
{
    /// Creates the loan first, then takes the copy off the shelf, then counts the loan
    /// against the user. Failures after the loan is written are deferred, not rolled back.
    #[tracing::instrument(skip_all, fields(book_id = %dto.book_id, user_id = %dto.user_id))]
    async fn borrow(&self, dto: BorrowDto) -> error_stack::Result<BorrowResultDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let book_id = BookId::new(dto.book_id);
        let user_id = UserId::new(dto.user_id);

        let user = self
            .user_query()
            .find_by_id(&mut con, &user_id)
            .await?
            .ok_or_else(|| not_found("user", &user_id))?;
        let book = self
            .book_query()
            .find_by_id(&mut con, &book_id)
            .await?
            .ok_or_else(|| not_found("book", &book_id))?;

        user.ensure_can_borrow()?;
        if !book.is_available() {
            return Err(Report::new(KernelError::from(Precondition::Unavailable)));
        }

        let now = self.clock().now();
        let loan = Loan::open(
            LoanId::new(Uuid::new_v4()),
            &book,
            &user,
            PickupCode::generate(),
            now,
        );
        self.loan_modifier().create(&mut con, &loan).await?;
        info!(loan_id = ?loan.id(), "Loan created");

        let mut deferred = Vec::new();
        if let Err(report) = self
            .book_modifier()
            .decrement_available(&mut con, &book_id)
            .await
        {
            let update = PendingUpdate::DecrementAvailability {
                book_id: book_id.clone(),
            };
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

impl<T> BorrowService for T where
    T: DependOnClock
        + DependOnDatabaseConnection
        + DependOnBookQuery
        + DependOnUserQuery
        + DependOnLoanModifier
        + DependOnBookModifier
        + DependOnUserModifier
        + DependOnPendingUpdateQueue
{
}

#[async_trait::async_trait]
pub trait ConfirmPickupService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnLendingPolicy
    + DependOnDatabaseConnection
    + DependOnLoanQuery
    + DependOnLoanModifier
{
    /// Only touches the loan; the copy was already taken at borrow time.
    #[tracing::instrument(skip_all)]
    async fn confirm_pickup(
        &self,
        dto: ConfirmPickupDto,
    ) -> error_stack::Result<LoanDto, KernelError> {
        let code = PickupCode::parse(&dto.pickup_code)?;
        let mut con = self.database_connection().acquire().await?;

        let mut loan = self
            .loan_query()
            .find_by_pickup_code(&mut con, &code, &LoanStatus::PendingPickup)
            .await?
            .ok_or_else(|| not_found("pending loan with pickup code", &code))?;

        let now = self.clock().now();
        loan.confirm_pickup(now, *self.lending_policy().loan_term())?;
        self.loan_modifier()
            .update(&mut con, &loan, &LoanStatus::PendingPickup)
            .await?;
        info!(loan_id = ?loan.id(), "Pickup confirmed");

        Ok(LoanDto::new(loan, now))
    }
}

impl<T> ConfirmPickupService for T where
    T: DependOnClock
        + DependOnLendingPolicy
        + DependOnDatabaseConnection
        + DependOnLoanQuery
        + DependOnLoanModifier
{
}

#[async_trait::async_trait]
pub trait ReturnService:
    'static
    + Sync
    + Send
    + DependOnClock
    + DependOnLendingPolicy
    + DependOnDatabaseConnection
    + DependOnLoanQuery
    + DependOnLoanModifier
    + DependOnUserModifier
    + DependOnPendingUpdateQueue
    + ReleaseCopyService
{
    /// Closes the loan, releases the user's slot, charges any fine, then hands the copy to
    /// the queue or the pool.
    #[tracing::instrument(skip_all, fields(loan_id = %dto.loan_id))]
    async fn return_loan(
        &self,
        dto: ReturnLoanDto,
    ) -> error_stack::Result<ReturnResultDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let loan_id = LoanId::new(dto.loan_id);

        let mut loan = self
            .loan_query()
            .find_by_id(&mut con, &loan_id)
            .await?
            .ok_or_else(|| not_found("loan", &loan_id))?;

        let now = self.clock().now();
        let fine = loan.return_at(now, *self.lending_policy().fine_per_day())?;
        self.loan_modifier()
            .update(&mut con, &loan, &LoanStatus::Active)
            .await?;
        info!(fine = ?fine, "Loan returned");

        let mut deferred = Vec::new();
        let user_id = loan.user_id().clone();
        if let Err(report) = self
            .user_modifier()
            .decrement_loans(&mut con, &user_id)
            .await
        {
            let update = PendingUpdate::DecrementUserLoans {
                user_id: user_id.clone(),
            };
            defer(self.pending_update_queue(), &mut deferred, update, report).await;
        }
        if !fine.is_zero() {
            if let Err(report) = self.user_modifier().add_fine(&mut con, &user_id, &fine).await {
                let update = PendingUpdate::ChargeFine {
                    user_id: user_id.clone(),
                    amount: fine,
                };
                defer(self.pending_update_queue(), &mut deferred, update, report).await;
            }
        }

        let book_id = loan.book_id().clone();
        let release = match self.release_copy(&mut con, &book_id).await {
            Ok(outcome) => outcome,
            Err(report) => {
                let update = PendingUpdate::ReleaseCopy { book_id };
                defer(self.pending_update_queue(), &mut deferred, update, report).await;
                ReleaseOutcome::Deferred
            }
        };
        debug!(?release, "Copy released");

        Ok(ReturnResultDto {
            loan: LoanDto::new(loan, now),
            fine: fine.into(),
            release,
            deferred,
        })
    }
}

impl<T> ReturnService for T where
    T: DependOnClock
        + DependOnLendingPolicy
        + DependOnDatabaseConnection
        + DependOnLoanQuery
        + DependOnLoanModifier
        + DependOnUserModifier
        + DependOnPendingUpdateQueue
        + ReleaseCopyService
{
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::service::fixture::{available, book, current_loans, user, user_with};
    use crate::service::ApplyPendingUpdateService;
    use driver::database::{InMemoryDatabase, StoreOperation};
    use kernel::interface::job::PendingUpdateQueue;
    use time::Duration;

    async fn borrow_and_pick_up(
        db: &InMemoryDatabase,
        book_id: Uuid,
        user_id: Uuid,
    ) -> error_stack::Result<LoanDto, KernelError> {
        let borrowed = db.borrow(BorrowDto { book_id, user_id }).await?;
        db.confirm_pickup(ConfirmPickupDto {
            pickup_code: borrowed.loan.pickup_code,
        })
        .await
    }

    #[tokio::test]
    async fn borrow_pickup_and_return() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Leto").await;

        let borrowed = db.borrow(BorrowDto { book_id, user_id }).await?;
        assert!(!borrowed.is_degraded());
        assert_eq!(borrowed.loan.status, "pending_pickup");
        assert_eq!(borrowed.loan.due_date, None);
        assert_eq!(available(&db, book_id).await, 0);
        assert_eq!(current_loans(&db, user_id).await, 1);

        // Typed at the desk in lower case with stray whitespace
        let typed = format!("  {}\n", borrowed.loan.pickup_code.to_lowercase());
        let loan = db.confirm_pickup(ConfirmPickupDto { pickup_code: typed }).await?;
        let now = db.clock().now();
        assert_eq!(loan.status, "active");
        assert_eq!(loan.due_date, Some(now + Duration::days(14)));
        assert_eq!(loan.days_until_due, 14);

        db.clock().advance(Duration::days(14));
        let returned = db.return_loan(ReturnLoanDto { loan_id: loan.id }).await?;
        assert_eq!(returned.loan.status, "returned");
        assert_eq!(returned.fine, 0);
        assert_eq!(returned.release, ReleaseOutcome::ReturnedToPool { moved: true });
        assert!(returned.deferred.is_empty());
        assert_eq!(available(&db, book_id).await, 1);
        assert_eq!(current_loans(&db, user_id).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn late_return_charges_whole_days() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Jessica").await;
        let loan = borrow_and_pick_up(&db, book_id, user_id).await?;

        db.clock().advance(Duration::days(19) + Duration::hours(5));
        let returned = db.return_loan(ReturnLoanDto { loan_id: loan.id }).await?;
        assert_eq!(returned.fine, 5);
        assert_eq!(returned.loan.fine, 5);
        let user = db.user(&UserId::new(user_id)).await.unwrap();
        assert_eq!(*user.total_fines().as_ref(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn loan_limit_blocks_without_side_effects() {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user_with(&db, 1, 1, true).await;

        let report = db.borrow(BorrowDto { book_id, user_id }).await.unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::LoanLimitExceeded)
        );
        assert_eq!(available(&db, book_id).await, 1);
        assert_eq!(current_loans(&db, user_id).await, 1);
        assert_eq!(db.pending_update_queue().queued_len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn borrow_rejections() {
        let db = InMemoryDatabase::new();
        let empty = book(&db, 1, 0).await;
        let user_id = user(&db, "Gurney").await;
        let report = db
            .borrow(BorrowDto {
                book_id: empty,
                user_id,
            })
            .await
            .unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::Unavailable)
        );

        let inactive = user_with(&db, 5, 0, false).await;
        let shelf = book(&db, 1, 1).await;
        let report = db
            .borrow(BorrowDto {
                book_id: shelf,
                user_id: inactive,
            })
            .await
            .unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::AccountInactive)
        );

        let report = db
            .borrow(BorrowDto {
                book_id: Uuid::new_v4(),
                user_id,
            })
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::NotFound);
    }

    #[tokio::test]
    async fn pickup_codes_are_single_use() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Duncan").await;
        let borrowed = db.borrow(BorrowDto { book_id, user_id }).await?;
        let code = borrowed.loan.pickup_code.clone();

        db.confirm_pickup(ConfirmPickupDto {
            pickup_code: code.clone(),
        })
        .await?;
        let report = db
            .confirm_pickup(ConfirmPickupDto { pickup_code: code })
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::NotFound);

        let report = db
            .confirm_pickup(ConfirmPickupDto {
                pickup_code: "AB-12".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(report.current_context(), &KernelError::Validation);
        Ok(())
    }

    #[tokio::test]
    async fn only_active_loans_can_be_returned() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Thufir").await;
        let borrowed = db.borrow(BorrowDto { book_id, user_id }).await?;

        let report = db
            .return_loan(ReturnLoanDto {
                loan_id: borrowed.loan.id,
            })
            .await
            .unwrap_err();
        assert_eq!(
            report.current_context(),
            &KernelError::Precondition(Precondition::LoanNotActive)
        );
        assert_eq!(available(&db, book_id).await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_counter_update_is_deferred_then_applied() -> error_stack::Result<(), KernelError>
    {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 2, 2).await;
        let user_id = user(&db, "Alia").await;
        db.fail_next(StoreOperation::DecrementAvailable, KernelError::StoreUnavailable)
            .await;

        let borrowed = db.borrow(BorrowDto { book_id, user_id }).await?;
        assert!(borrowed.is_degraded());
        assert_eq!(
            borrowed.deferred,
            vec![PendingUpdate::DecrementAvailability {
                book_id: BookId::new(book_id)
            }]
        );
        assert!(db.loan(&LoanId::new(borrowed.loan.id)).await.is_some());
        assert_eq!(available(&db, book_id).await, 2);
        assert_eq!(current_loans(&db, user_id).await, 1);

        for update in db.pending_update_queue().take_all().await {
            db.apply_pending_update(update).await?;
        }
        assert_eq!(available(&db, book_id).await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unreleased_copy_is_deferred_on_return() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Stilgar").await;
        let loan = borrow_and_pick_up(&db, book_id, user_id).await?;
        db.fail_next(StoreOperation::FindReservation, KernelError::StoreUnavailable)
            .await;

        let returned = db.return_loan(ReturnLoanDto { loan_id: loan.id }).await?;
        assert_eq!(returned.release, ReleaseOutcome::Deferred);
        assert_eq!(
            returned.deferred,
            vec![PendingUpdate::ReleaseCopy {
                book_id: BookId::new(book_id)
            }]
        );
        assert_eq!(returned.loan.status, "returned");
        assert_eq!(available(&db, book_id).await, 0);

        for update in db.pending_update_queue().take_all().await {
            db.apply_pending_update(update).await?;
        }
        assert_eq!(available(&db, book_id).await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn deferral_survives_a_broken_queue() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book_id = book(&db, 1, 1).await;
        let user_id = user(&db, "Chani").await;
        db.pending_update_queue().reject_enqueue(true).await;
        db.fail_next(StoreOperation::IncrementLoans, KernelError::StoreUnavailable)
            .await;

        let borrowed = db.borrow(BorrowDto { book_id, user_id }).await?;
        assert_eq!(
            borrowed.deferred,
            vec![PendingUpdate::IncrementUserLoans {
                user_id: UserId::new(user_id)
            }]
        );
        assert_eq!(current_loans(&db, user_id).await, 0);
        Ok(())
    }
}
