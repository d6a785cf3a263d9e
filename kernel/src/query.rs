mod book;
mod loan;
mod reservation;
mod user;

pub use self::{book::*, loan::*, reservation::*, user::*};
