mod book;
mod common;
mod loan;
mod reservation;
mod user;

pub use self::{book::*, common::*, loan::*, reservation::*, user::*};
