use crate::error::ConvertError;
use error_stack::{Report, ResultExt};
use kernel::KernelError;
use std::fmt::Debug;
use std::str::FromStr;

pub mod config;
pub mod database;
mod error;

pub(crate) fn env(key: &str) -> error_stack::Result<String, KernelError> {
    dotenvy::var(key)
        .convert_error()
        .attach_printable_lazy(|| format!("Failed to read env {key}"))
}

/// Reads one setting. `dotenvy::var` in production, a fixed map in tests.
pub(crate) type Lookup = dyn Fn(&str) -> Result<String, dotenvy::Error>;

/// Optional setting: unset falls back to `default`, a malformed value is an error.
pub(crate) fn setting_or<T>(
    var: &Lookup,
    key: &str,
    default: T,
) -> error_stack::Result<T, KernelError>
where
    T: FromStr,
    T::Err: Debug,
{
    match var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|error| {
            Report::new(KernelError::Internal)
                .attach_printable(format!("Invalid value for {key}: {raw:?} ({error:?})"))
        }),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => Ok(default),
        Err(error) => Err(Report::new(error).change_context(KernelError::Internal)),
    }
}
