mod fine;
mod time;

pub use self::fine::*;
pub use self::time::*;
