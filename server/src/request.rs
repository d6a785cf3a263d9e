mod book;
mod loan;
mod queue;
mod reservation;
mod user;

pub use self::{book::*, loan::*, queue::*, reservation::*, user::*};
