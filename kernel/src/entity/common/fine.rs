use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

/// Money owed, in whole units. Never negative.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Fromln, AsRefln)]
pub struct FineAmount(i64);

impl FineAmount {
    pub fn new(amount: impl Into<i64>) -> Self {
        Self(amount.into().max(0))
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn add(self, other: FineAmount) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}
