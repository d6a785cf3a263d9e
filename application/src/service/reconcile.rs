use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::query::{
    BookQuery, DependOnBookQuery, DependOnLoanQuery, DependOnReservationQuery, DependOnUserQuery,
    LoanQuery, ReservationQuery, UserQuery,
};
use kernel::interface::update::{
    BookModifier, DependOnBookModifier, DependOnUserModifier, UserModifier,
};
use kernel::prelude::entity::{
    AvailableCopies, BookId, CurrentLoans, FineAmount, ReservationStatus, UserId,
};
use kernel::KernelError;
use tracing::warn;

use crate::service::not_found;
use crate::transfer::{
    CounterReportDto, ReconcileBookDto, ReconcileReportDto, ReconcileUserDto,
};

fn counter(name: &'static str, recorded: i64, expected: i64) -> CounterReportDto {
    CounterReportDto {
        counter: name,
        recorded,
        expected,
        corrected: recorded != expected,
    }
}

/// Recomputes the shared counters from the records they summarise and repairs drift left
/// by deferred updates that never landed, or landed twice. Each repair is a compare-and-set
/// on the value read here, so a workflow that moves the counter in between wins and the
/// reconciliation fails with `Conflict`.
#[async_trait::async_trait]
pub trait ReconcileService:
    'static
    + Sync
    + Send
    + DependOnDatabaseConnection
    + DependOnBookQuery
    + DependOnUserQuery
    + DependOnLoanQuery
    + DependOnReservationQuery
    + DependOnBookModifier
    + DependOnUserModifier
{
    /// Off-shelf copies are outstanding loans plus `ready` reservations.
    #[tracing::instrument(skip_all, fields(book_id = %dto.book_id))]
    async fn reconcile_book(
        &self,
        dto: ReconcileBookDto,
    ) -> error_stack::Result<ReconcileReportDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let book_id = BookId::new(dto.book_id);

        let book = self
            .book_query()
            .find_by_id(&mut con, &book_id)
            .await?
            .ok_or_else(|| not_found("book", &book_id))?;
        let outstanding = self
            .loan_query()
            .find_by_book_id(&mut con, &book_id)
            .await?
            .iter()
            .filter(|loan| loan.status().is_outstanding())
            .count();
        let ready = self
            .reservation_query()
            .find_by_book_id(&mut con, &book_id)
            .await?
            .iter()
            .filter(|reservation| reservation.status() == &ReservationStatus::Ready)
            .count();

        let total = *book.total_copies().as_ref();
        let held = i32::try_from(outstanding + ready).unwrap_or(i32::MAX);
        let expected = total.saturating_sub(held).clamp(0, total);
        let recorded = *book.available_copies().as_ref();

        let report = counter("available_copies", recorded.into(), expected.into());
        if report.corrected {
            warn!(recorded, expected, "Available copies drifted, restoring");
            self.book_modifier()
                .restore_available(
                    &mut con,
                    &book_id,
                    book.available_copies(),
                    &AvailableCopies::new(expected),
                )
                .await?;
        }

        Ok(ReconcileReportDto {
            id: dto.book_id,
            counters: vec![report],
        })
    }

    #[tracing::instrument(skip_all, fields(user_id = %dto.user_id))]
    async fn reconcile_user(
        &self,
        dto: ReconcileUserDto,
    ) -> error_stack::Result<ReconcileReportDto, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let user_id = UserId::new(dto.user_id);

        let user = self
            .user_query()
            .find_by_id(&mut con, &user_id)
            .await?
            .ok_or_else(|| not_found("user", &user_id))?;
        let loans = self
            .loan_query()
            .find_by_user_id(&mut con, &user_id)
            .await?;
        let outstanding = loans
            .iter()
            .filter(|loan| loan.status().is_outstanding())
            .count();
        // Fines are only ever charged from a returned loan's own fine
        let fines = loans
            .iter()
            .fold(FineAmount::zero(), |total, loan| total.add(*loan.fine()));

        let limit = *user.loan_limit().as_ref();
        let expected = i32::try_from(outstanding).unwrap_or(i32::MAX).clamp(0, limit);
        let recorded = *user.current_loans().as_ref();
        let loans_report = counter("current_loans", recorded.into(), expected.into());
        if loans_report.corrected {
            warn!(recorded, expected, "Current loans drifted, restoring");
            self.user_modifier()
                .restore_loans(
                    &mut con,
                    &user_id,
                    user.current_loans(),
                    &CurrentLoans::new(expected),
                )
                .await?;
        }

        let fines_report = counter(
            "total_fines",
            *user.total_fines().as_ref(),
            *fines.as_ref(),
        );
        if fines_report.corrected {
            warn!(
                recorded = fines_report.recorded,
                expected = fines_report.expected,
                "Total fines drifted, restoring"
            );
            self.user_modifier()
                .restore_fines(&mut con, &user_id, user.total_fines(), &fines)
                .await?;
        }

        Ok(ReconcileReportDto {
            id: dto.user_id,
            counters: vec![loans_report, fines_report],
        })
    }
}

impl<T> ReconcileService for T where
    T: DependOnDatabaseConnection
        + DependOnBookQuery
        + DependOnUserQuery
        + DependOnLoanQuery
        + DependOnReservationQuery
        + DependOnBookModifier
        + DependOnUserModifier
{
}
