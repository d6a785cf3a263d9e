mod loan;
mod queue;
mod reconcile;
mod reservation;

pub use self::{loan::*, queue::*, reconcile::*, reservation::*};
