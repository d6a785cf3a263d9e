use error_stack::Report;
use kernel::interface::query::UserQuery;
use kernel::interface::update::UserModifier;
use kernel::prelude::entity::{CurrentLoans, FineAmount, User, UserId};
use kernel::KernelError;

use crate::database::memory::{InMemoryConnection, StoreOperation};

fn not_found(id: &UserId) -> Report<KernelError> {
    Report::new(KernelError::NotFound).attach_printable(format!("user {id:?} not found"))
}

pub struct InMemoryUserRepository;

#[async_trait::async_trait]
impl UserQuery for InMemoryUserRepository {
    type Connection = InMemoryConnection;
    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &UserId,
    ) -> error_stack::Result<Option<User>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindUser)?;
        Ok(store.users.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl UserModifier for InMemoryUserRepository {
    type Connection = InMemoryConnection;

    async fn create(
        &self,
        con: &mut Self::Connection,
        user: &User,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::CreateUser)?;
        store.users.insert(user.id().clone(), user.clone());
        Ok(())
    }

    async fn increment_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::IncrementLoans)?;
        store
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found(user_id))?
            .increment_loans()
    }

    async fn decrement_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<bool, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::DecrementLoans)?;
        let user = store
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found(user_id))?;
        Ok(user.decrement_loans())
    }

    async fn restore_loans(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        recorded: &CurrentLoans,
        current: &CurrentLoans,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::RestoreLoans)?;
        store
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found(user_id))?
            .restore_loans(*recorded, *current)
    }

    async fn restore_fines(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        recorded: &FineAmount,
        total: &FineAmount,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::RestoreFines)?;
        store
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found(user_id))?
            .restore_fines(*recorded, *total)
    }

    async fn add_fine(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
        amount: &FineAmount,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::AddFine)?;
        store
            .users
            .get_mut(user_id)
            .ok_or_else(|| not_found(user_id))?
            .add_fine(*amount);
        Ok(())
    }
}
