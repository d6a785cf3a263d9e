use kernel::interface::config::{Clock, LendingPolicy};
use kernel::interface::job::QueueConfig;
use kernel::prelude::entity::FineAmount;
use kernel::KernelError;
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};

use crate::{setting_or, Lookup};

const LOAN_TERM_DAYS: &str = "LOAN_TERM_DAYS";
const READY_WINDOW_DAYS: &str = "READY_WINDOW_DAYS";
const RESERVATION_HOLD_DAYS: &str = "RESERVATION_HOLD_DAYS";
const FINE_PER_DAY: &str = "FINE_PER_DAY";

const QUEUE_WORKERS: &str = "QUEUE_WORKERS";
const QUEUE_MAX_RETRY: &str = "QUEUE_MAX_RETRY";
const QUEUE_RETRY_IDLE_SECS: &str = "QUEUE_RETRY_IDLE_SECS";

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub fn lending_policy_from_env() -> error_stack::Result<LendingPolicy, KernelError> {
    lending_policy_from(&|key: &str| dotenvy::var(key))
}

pub fn queue_config_from_env() -> error_stack::Result<QueueConfig, KernelError> {
    queue_config_from(&|key: &str| dotenvy::var(key))
}

fn lending_policy_from(var: &Lookup) -> error_stack::Result<LendingPolicy, KernelError> {
    let defaults = LendingPolicy::default();
    let days = |key: &str, default: &Duration| {
        setting_or(var, key, default.whole_days()).map(Duration::days)
    };
    Ok(LendingPolicy::new(
        days(LOAN_TERM_DAYS, defaults.loan_term())?,
        days(READY_WINDOW_DAYS, defaults.ready_window())?,
        days(RESERVATION_HOLD_DAYS, defaults.reservation_hold())?,
        FineAmount::new(setting_or(var, FINE_PER_DAY, *defaults.fine_per_day().as_ref())?),
    ))
}

fn queue_config_from(var: &Lookup) -> error_stack::Result<QueueConfig, KernelError> {
    let defaults = QueueConfig::default();
    Ok(QueueConfig::new(
        setting_or(var, QUEUE_WORKERS, *defaults.worker_count())?,
        setting_or(var, QUEUE_MAX_RETRY, *defaults.max_retry())?,
        StdDuration::from_secs(setting_or(
            var,
            QUEUE_RETRY_IDLE_SECS,
            defaults.retry_idle().as_secs(),
        )?),
    ))
}
