use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Fromln, AsRefln)]
pub struct TotalCopies(i32);

impl TotalCopies {
    pub fn new(amount: impl Into<i32>) -> Self {
        Self(amount.into().max(0))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize, Fromln, AsRefln)]
pub struct AvailableCopies(i32);

impl AvailableCopies {
    pub fn new(amount: impl Into<i32>) -> Self {
        Self(amount.into())
    }
}
