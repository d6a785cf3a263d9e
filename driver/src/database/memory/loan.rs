use error_stack::Report;
use kernel::interface::query::LoanQuery;
use kernel::interface::update::LoanModifier;
use kernel::prelude::entity::{BookId, Loan, LoanId, LoanStatus, PickupCode, UserId};
use kernel::KernelError;

use crate::database::memory::{InMemoryConnection, StoreOperation};

pub struct InMemoryLoanRepository;

#[async_trait::async_trait]
impl LoanQuery for InMemoryLoanRepository {
    type Connection = InMemoryConnection;

    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &LoanId,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindLoan)?;
        Ok(store.loans.get(id).cloned())
    }

    async fn find_by_pickup_code(
        &self,
        con: &mut Self::Connection,
        code: &PickupCode,
        status: &LoanStatus,
    ) -> error_stack::Result<Option<Loan>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindLoan)?;
        Ok(store
            .loans
            .values()
            .filter(|loan| loan.pickup_code() == code && loan.status() == status)
            .max_by(|a, b| a.loaned_at().as_ref().cmp(b.loaned_at().as_ref()))
            .cloned())
    }

    async fn find_by_book_id(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindLoan)?;
        Ok(store
            .loans
            .values()
            .filter(|loan| loan.book_id() == book_id)
            .cloned()
            .collect())
    }

    async fn find_by_user_id(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindLoan)?;
        Ok(store
            .loans
            .values()
            .filter(|loan| loan.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn find_by_status(
        &self,
        con: &mut Self::Connection,
        status: &LoanStatus,
    ) -> error_stack::Result<Vec<Loan>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindLoan)?;
        Ok(store
            .loans
            .values()
            .filter(|loan| loan.status() == status)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl LoanModifier for InMemoryLoanRepository {
    type Connection = InMemoryConnection;

    async fn create(
        &self,
        con: &mut Self::Connection,
        loan: &Loan,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::CreateLoan)?;
        store.loans.insert(loan.id().clone(), loan.clone());
        Ok(())
    }

    async fn update(
        &self,
        con: &mut Self::Connection,
        loan: &Loan,
        expected: &LoanStatus,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::UpdateLoan)?;
        let stored = store.loans.get_mut(loan.id()).ok_or_else(|| {
            Report::new(KernelError::NotFound)
                .attach_printable(format!("loan {:?} not found", loan.id()))
        })?;
        if stored.status() != expected {
            return Err(Report::new(KernelError::Conflict).attach_printable(format!(
                "loan {:?} is {}, expected {}",
                loan.id(),
                stored.status().as_str(),
                expected.as_str()
            )));
        }
        *stored = loan.clone();
        Ok(())
    }
}
