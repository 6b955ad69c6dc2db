#![forbid(unsafe_code)]

//! Error types for the reactive core.
//!
//! Only two kinds of failure ever reach a caller: a drained microtask queue
//! that blew its budget, and a configuration that could not be loaded.
//! Observer failures are contained by the registry and never escape
//! [`Topic::notify_all`](crate::Topic::notify_all).

use thiserror::Error;

/// Failure reported by an [`Observer`](crate::Observer) hook.
///
/// The registry logs these and moves on to the next observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObserverError {
    /// The observer refused the notification (bad payload, inconsistent
    /// local state, ...).
    #[error("observer rejected notification: {0}")]
    Rejected(String),
    /// The consumer owning this observer has already been torn down.
    #[error("observer is defunct")]
    Defunct,
}

impl ObserverError {
    /// Convenience constructor for [`ObserverError::Rejected`].
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

/// Error type for [`Scheduler`](crate::Scheduler) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// A single drain ran more microtasks than allowed. The remaining tasks
    /// stay queued; a task that keeps re-queueing itself is the usual cause.
    #[error("microtask drain exceeded budget of {limit} tasks")]
    MicrotaskBudgetExceeded {
        /// Configured per-drain limit.
        limit: usize,
    },
}

/// Error type for configuration loading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The configuration text could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// A field parsed but holds an unusable value.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was refused.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ObserverError::rejected("bad row").to_string(),
            "observer rejected notification: bad row"
        );
        assert_eq!(ObserverError::Defunct.to_string(), "observer is defunct");
        assert_eq!(
            SchedulerError::MicrotaskBudgetExceeded { limit: 8 }.to_string(),
            "microtask drain exceeded budget of 8 tasks"
        );
        let err = ConfigError::Invalid {
            field: "max_microtasks_per_drain",
            reason: "must be non-zero",
        };
        assert_eq!(
            err.to_string(),
            "invalid value for `max_microtasks_per_drain`: must be non-zero"
        );
    }
}
