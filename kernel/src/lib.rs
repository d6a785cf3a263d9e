pub use crate::error::*;

mod clock;
mod database;
mod entity;
mod error;
mod job;
mod modify;
mod policy;
mod query;

#[cfg(feature = "prelude")]
pub mod prelude {
    pub mod entity {
        pub use crate::entity::*;
    }
}

#[cfg(feature = "interface")]
pub mod interface {
    pub mod database {
        pub use crate::database::*;
    }
    pub mod query {
        pub use crate::query::*;
    }
    pub mod update {
        pub use crate::modify::*;
    }
    pub mod job {
        pub use crate::job::*;
    }
    pub mod config {
        pub use crate::clock::*;
        pub use crate::policy::*;
    }
}
