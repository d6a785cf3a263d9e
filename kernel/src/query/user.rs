use crate::database::{DatabaseConnection, DependOnDatabaseConnection};
use crate::entity::{User, UserId};
use crate::KernelError;

#[async_trait::async_trait]
pub trait UserQuery: 'static + Sync + Send {
    type Connection: 'static + Send;
    async fn find_by_id(
        &self,
        con: &mut Self::Connection,
        id: &UserId,
    ) -> error_stack::Result<Option<User>, KernelError>;
}

pub trait DependOnUserQuery: 'static + Sync + Send + DependOnDatabaseConnection {
    type UserQuery: UserQuery<
        Connection = <Self::DatabaseConnection as DatabaseConnection>::Connection,
    >;
    fn user_query(&self) -> &Self::UserQuery;
}
