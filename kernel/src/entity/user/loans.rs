use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Fromln, AsRefln, Serialize, Deserialize)]
pub struct LoanLimit(i32);

impl LoanLimit {
    pub fn new(limit: impl Into<i32>) -> Self {
        Self(limit.into().max(0))
    }
}

impl Default for LoanLimit {
    fn default() -> Self {
        Self(5)
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Fromln, AsRefln, Serialize, Deserialize)]
pub struct CurrentLoans(i32);

impl CurrentLoans {
    pub fn new(count: impl Into<i32>) -> Self {
        Self(count.into())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Fromln, AsRefln, Serialize, Deserialize)]
pub struct AccountActive(bool);

impl AccountActive {
    pub fn new(active: impl Into<bool>) -> Self {
        Self(active.into())
    }
}
