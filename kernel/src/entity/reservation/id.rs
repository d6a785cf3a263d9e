use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Fromln, AsRefln)]
pub struct ReservationId(Uuid);

impl ReservationId {
    pub fn new(id: impl Into<Uuid>) -> Self {
        Self(id.into())
    }
}
