//! Bounded re-read-and-retry for optimistic-concurrency conflicts.

use crm_core::config::LifecycleConfig;
use crm_core::{CrmError, TransitionError};
use tracing::warn;

/// Errors that can signal a stale read.
pub trait ConflictAware {
    fn is_conflict(&self) -> bool;
}

impl ConflictAware for TransitionError {
    fn is_conflict(&self) -> bool {
        TransitionError::is_conflict(self)
    }
}

impl ConflictAware for CrmError {
    fn is_conflict(&self) -> bool {
        matches!(self, CrmError::Transition(e) if e.is_conflict())
    }
}

/// Retries an operation while it fails with a conflict.
///
/// The operation must perform a fresh read of the contact on every attempt;
/// re-applying a stale snapshot would defeat the version check.
#[derive(Debug, Clone, Copy)]
pub struct ConflictRetry {
    max_attempts: u32,
}

impl ConflictRetry {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// One initial attempt plus the configured number of retries.
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(config.max_conflict_retries.saturating_add(1))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `op` with the 1-based attempt number until it succeeds, fails with a
    /// non-conflict error, or the attempts are exhausted. The last error is returned.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        E: ConflictAware,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Err(e) if e.is_conflict() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Contact changed concurrently, retrying with a fresh read"
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

impl Default for ConflictRetry {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}
