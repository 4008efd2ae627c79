use chrono::{DateTime, Duration, Utc};

use crate::credentials::Credential;

/// Consecutive failures after which an account is skipped.
pub const OPEN_AFTER_FAILURES: u64 = 3;

/// How long after the last success an account stays skipped. Once the last
/// success is older than this, the account becomes eligible again regardless
/// of its failure streak.
pub fn retry_cooldown() -> Duration {
    Duration::hours(1)
}

/// One provider credential together with its access history. Created once
/// per configured credential at provider construction and mutated on every
/// access attempt for the life of the process.
#[derive(Debug, Clone)]
pub struct Account {
    credential: Credential,
    pub successful_accesses: u64,
    pub failed_accesses: u64,
    pub subsequent_successes: u64,
    pub subsequent_failures: u64,
    pub last_access: Option<DateTime<Utc>>,
    pub last_successful_access: Option<DateTime<Utc>>,
    pub last_failed_access: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            successful_accesses: 0,
            failed_accesses: 0,
            subsequent_successes: 0,
            subsequent_failures: 0,
            last_access: None,
            last_successful_access: None,
            last_failed_access: None,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn register_success(&mut self, now: DateTime<Utc>) {
        self.subsequent_failures = 0;
        self.subsequent_successes += 1;
        self.successful_accesses += 1;
        self.last_successful_access = Some(now);
        self.last_access = Some(now);
    }

    pub fn register_failure(&mut self, now: DateTime<Utc>) {
        self.subsequent_successes = 0;
        self.subsequent_failures += 1;
        self.failed_accesses += 1;
        self.last_failed_access = Some(now);
        self.last_access = Some(now);
    }

    /// Whether the circuit for this account is open (the account is skipped).
    ///
    /// Open requires both a failure streak and a still-recent success; an
    /// account that has never succeeded is always eligible, and one whose
    /// last success is at least the cooldown old is retried no matter how
    /// long its failure streak is.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.subsequent_failures >= OPEN_AFTER_FAILURES
            && self
                .last_successful_access
                .is_some_and(|at| now - at < retry_cooldown())
    }
}
