mod loan;
mod maintenance;
mod reservation;

pub use self::{loan::*, maintenance::*, reservation::*};
