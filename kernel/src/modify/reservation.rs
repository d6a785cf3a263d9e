use crate::database::{DatabaseConnection, DependOnDatabaseConnection};
use crate::entity::{Reservation, ReservationStatus};
use crate::KernelError;

#[async_trait::async_trait]
pub trait ReservationModifier: 'static + Sync + Send {
    type Connection: 'static + Send;
    async fn create(
        &self,
        con: &mut Self::Connection,
        reservation: &Reservation,
    ) -> error_stack::Result<(), KernelError>;

    /// Compare-and-set on the status; `Conflict` when another writer moved it first.
    async fn update(
        &self,
        con: &mut Self::Connection,
        reservation: &Reservation,
        expected: &ReservationStatus,
    ) -> error_stack::Result<(), KernelError>;
}

pub trait DependOnReservationModifier: 'static + Sync + Send + DependOnDatabaseConnection {
    type ReservationModifier: ReservationModifier<
        Connection = <Self::DatabaseConnection as DatabaseConnection>::Connection,
    >;
    fn reservation_modifier(&self) -> &Self::ReservationModifier;
}
