use error_stack::Report;
use kernel::interface::query::ReservationQuery;
use kernel::interface::update::ReservationModifier;
use kernel::prelude::entity::{BookId, Reservation, ReservationId, ReservationStatus, UserId};
use kernel::KernelError;

use crate::database::memory::{InMemoryConnection, StoreOperation};

pub struct InMemoryReservationRepository;

#[async_trait::async_trait]
impl ReservationQuery for InMemoryReservationRepository {
    type Connection = InMemoryConnection;

    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &ReservationId,
    ) -> error_stack::Result<Option<Reservation>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindReservation)?;
        Ok(store.reservations.get(id).cloned())
    }

    async fn find_by_book_id(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Reservation>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindReservation)?;
        Ok(store
            .reservations
            .values()
            .filter(|reservation| reservation.book_id() == book_id)
            .cloned()
            .collect())
    }

    async fn find_by_user_id(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<Reservation>, KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::FindReservation)?;
        Ok(store
            .reservations
            .values()
            .filter(|reservation| reservation.user_id() == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl ReservationModifier for InMemoryReservationRepository {
    type Connection = InMemoryConnection;

    async fn create(
        &self,
        con: &mut Self::Connection,
        reservation: &Reservation,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::CreateReservation)?;
        store
            .reservations
            .insert(reservation.id().clone(), reservation.clone());
        Ok(())
    }

    async fn update(
        &self,
        con: &mut Self::Connection,
        reservation: &Reservation,
        expected: &ReservationStatus,
    ) -> error_stack::Result<(), KernelError> {
        let mut store = con.lock().await;
        store.check(StoreOperation::UpdateReservation)?;
        let stored = store.reservations.get_mut(reservation.id()).ok_or_else(|| {
            Report::new(KernelError::NotFound)
                .attach_printable(format!("reservation {:?} not found", reservation.id()))
        })?;
        if stored.status() != expected {
            return Err(Report::new(KernelError::Conflict).attach_printable(format!(
                "reservation {:?} is {}, expected {}",
                reservation.id(),
                stored.status().as_str(),
                expected.as_str()
            )));
        }
        *stored = reservation.clone();
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::InMemoryDatabase;
    use kernel::interface::database::DatabaseConnection;
    use kernel::prelude::entity::{
        Book, BookTitle, TotalCopies, User, UserName,
    };
    use time::macros::datetime;
    use time::Duration;
    use uuid::Uuid;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn racing_mark_ready_lands_once() -> error_stack::Result<(), KernelError> {
        let db = InMemoryDatabase::new();
        let book = Book::catalogue(
            BookId::new(Uuid::new_v4()),
            BookTitle::new("The Dispossessed"),
            TotalCopies::new(1),
        );
        let user = User::register(UserId::new(Uuid::new_v4()), UserName::new("Shevek"));
        let now = datetime!(2024-03-01 10:00 UTC);
        let pending = Reservation::enqueue(
            ReservationId::new(Uuid::new_v4()),
            &book,
            &user,
            now,
            Duration::days(7),
        );
        let mut con = db.acquire().await?;
        InMemoryReservationRepository.create(&mut con, &pending).await?;

        let attempts = (0..2).map(|_| {
            let db = db.clone();
            let mut stale = pending.clone();
            tokio::spawn(async move {
                stale.mark_ready(now, Duration::days(3))?;
                let mut con = db.acquire().await?;
                InMemoryReservationRepository
                    .update(&mut con, &stale, &ReservationStatus::Pending)
                    .await
            })
        });
        let mut landed = 0;
        let mut conflicts = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.map_err(|error| {
                Report::new(KernelError::Internal).attach_printable(error.to_string())
            })? {
                Ok(()) => landed += 1,
                Err(report) if report.current_context().is_conflict() => conflicts += 1,
                Err(report) => return Err(report),
            }
        }
        assert_eq!((landed, conflicts), (1, 1));
        let stored = db.reservation(pending.id()).await.map(|r| *r.status());
        assert_eq!(stored, Some(ReservationStatus::Ready));
        Ok(())
    }
}
