use crate::KernelError;
use error_stack::Report;
use rand::Rng;
use serde::{Deserialize, Serialize};
use vodca::{AsRefln, Fromln};

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const LENGTH: usize = 6;

/// Six symbols from `[A-Z0-9]`. Not unique: a code only identifies a loan while that
/// loan is still waiting for pickup.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize, Fromln, AsRefln)]
pub struct PickupCode(String);

impl PickupCode {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..LENGTH)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        Self(code)
    }

    /// Accepts a code as typed at the desk: surrounding whitespace and letter case are ignored.
    pub fn parse(raw: impl AsRef<str>) -> error_stack::Result<Self, KernelError> {
        let code = raw.as_ref().trim().to_ascii_uppercase();
        if code.len() != LENGTH || !code.bytes().all(|b| CHARSET.contains(&b)) {
            return Err(Report::new(KernelError::Validation)
                .attach_printable(format!("malformed pickup code {:?}", raw.as_ref())));
        }
        Ok(Self(code))
    }
}
