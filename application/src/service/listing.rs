use kernel::interface::config::{Clock, DependOnClock};
use kernel::interface::database::{DatabaseConnection, DependOnDatabaseConnection};
use kernel::interface::query::{
    DependOnLoanQuery, DependOnReservationQuery, LoanQuery, ReservationQuery,
};
use kernel::prelude::entity::{Loan, LoanStatus, UserId};
use kernel::KernelError;
use time::OffsetDateTime;

use crate::transfer::{GetUserLoansDto, GetUserReservationsDto, LoanDto, ReservationDto};

#[async_trait::async_trait]
pub trait ListUserLoansService:
    'static + Sync + Send + DependOnClock + DependOnDatabaseConnection + DependOnLoanQuery
{
    /// Newest first.
    async fn list_user_loans(
        &self,
        dto: GetUserLoansDto,
    ) -> error_stack::Result<Vec<LoanDto>, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let mut loans = self
            .loan_query()
            .find_by_user_id(&mut con, &UserId::new(dto.user_id))
            .await?;
        loans.sort_by(|a, b| b.loaned_at().as_ref().cmp(a.loaned_at().as_ref()));
        let now = self.clock().now();
        Ok(loans
            .into_iter()
            .map(|loan| LoanDto::new(loan, now))
            .collect())
    }
}

impl<T> ListUserLoansService for T where
    T: DependOnClock + DependOnDatabaseConnection + DependOnLoanQuery
{
}

#[async_trait::async_trait]
pub trait ListUserReservationsService:
    'static + Sync + Send + DependOnClock + DependOnDatabaseConnection + DependOnReservationQuery
{
    async fn list_user_reservations(
        &self,
        dto: GetUserReservationsDto,
    ) -> error_stack::Result<Vec<ReservationDto>, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let mut reservations = self
            .reservation_query()
            .find_by_user_id(&mut con, &UserId::new(dto.user_id))
            .await?;
        reservations.sort_by(|a, b| b.reserved_at().as_ref().cmp(a.reserved_at().as_ref()));
        let now = self.clock().now();
        Ok(reservations
            .into_iter()
            .map(|reservation| ReservationDto::new(reservation, now))
            .collect())
    }
}

impl<T> ListUserReservationsService for T where
    T: DependOnClock + DependOnDatabaseConnection + DependOnReservationQuery
{
}

#[async_trait::async_trait]
pub trait ListOverdueLoansService:
    'static + Sync + Send + DependOnClock + DependOnDatabaseConnection + DependOnLoanQuery
{
    /// Active loans past their due date, longest overdue first.
    async fn list_overdue_loans(&self) -> error_stack::Result<Vec<LoanDto>, KernelError> {
        let now = self.clock().now();
        let mut loans = overdue(self, now).await?;
        loans.sort_by_key(|loan| loan.due_date().as_ref().map(|due| *due.as_ref()));
        Ok(loans
            .into_iter()
            .map(|loan| LoanDto::new(loan, now))
            .collect())
    }

    async fn count_overdue_loans(&self) -> error_stack::Result<usize, KernelError> {
        Ok(overdue(self, self.clock().now()).await?.len())
    }
}

async fn overdue<T>(
    service: &T,
    now: OffsetDateTime,
) -> error_stack::Result<Vec<Loan>, KernelError>
where
    T: DependOnLoanQuery + ?Sized,
{
    let mut con = service.database_connection().acquire().await?;
    let loans = service
        .loan_query()
        .find_by_status(&mut con, &LoanStatus::Active)
        .await?;
    Ok(loans.into_iter().filter(|loan| loan.is_overdue(now)).collect())
}

impl<T> ListOverdueLoansService for T where
    T: DependOnClock + DependOnDatabaseConnection + DependOnLoanQuery
{
}

#[async_trait::async_trait]
pub trait ListPendingPickupsService:
    'static + Sync + Send + DependOnClock + DependOnDatabaseConnection + DependOnLoanQuery
{
    /// Loans waiting at the desk, oldest first.
    async fn list_pending_pickups(&self) -> error_stack::Result<Vec<LoanDto>, KernelError> {
        let mut con = self.database_connection().acquire().await?;
        let mut loans = self
            .loan_query()
            .find_by_status(&mut con, &LoanStatus::PendingPickup)
            .await?;
        loans.sort_by(|a, b| a.loaned_at().as_ref().cmp(b.loaned_at().as_ref()));
        let now = self.clock().now();
        Ok(loans
            .into_iter()
            .map(|loan| LoanDto::new(loan, now))
            .collect())
    }
}

impl<T> ListPendingPickupsService for T where
    T: DependOnClock + DependOnDatabaseConnection + DependOnLoanQuery
{
}
