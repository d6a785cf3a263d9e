use crate::database::{DatabaseConnection, DependOnDatabaseConnection};
use crate::entity::{BookId, Reservation, ReservationId, UserId};
use crate::KernelError;

/// List lookups return every status; callers filter client-side.
#[async_trait::async_trait]
pub trait ReservationQuery: 'static + Sync + Send {
    type Connection: 'static + Send;
    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &ReservationId,
    ) -> error_stack::Result<Option<Reservation>, KernelError>;

    async fn find_by_book_id(
        &self,
        con: &mut Self::Connection,
        book_id: &BookId,
    ) -> error_stack::Result<Vec<Reservation>, KernelError>;

    async fn find_by_user_id(
        &self,
        con: &mut Self::Connection,
        user_id: &UserId,
    ) -> error_stack::Result<Vec<Reservation>, KernelError>;
}

pub trait DependOnReservationQuery: 'static + Sync + Send + DependOnDatabaseConnection {
    type ReservationQuery: ReservationQuery<
        Connection = <Self::DatabaseConnection as DatabaseConnection>::Connection,
    >;
    fn reservation_query(&self) -> &Self::ReservationQuery;
}
