#![forbid(unsafe_code)]

//! Scheduler configuration.
//!
//! Built in code with the `with_*` builder methods, or (with the
//! `policy-config` feature) loaded from a TOML `[scheduler]` table:
//!
//! ```toml
//! [scheduler]
//! max_microtasks_per_drain = 4096
//! log_flushes = true
//! ```

use crate::error::ConfigError;

/// Default cap on microtasks run by one drain.
pub const DEFAULT_MICROTASK_BUDGET: usize = 10_000;

/// Tunables for a [`Scheduler`](crate::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "policy-config", derive(serde::Deserialize))]
#[cfg_attr(feature = "policy-config", serde(default, deny_unknown_fields))]
pub struct SchedulerConfig {
    /// Maximum microtasks a single drain may run before giving up with
    /// [`SchedulerError::MicrotaskBudgetExceeded`](crate::SchedulerError).
    pub max_microtasks_per_drain: usize,
    /// Emit a `trace` record for every container flush.
    pub log_flushes: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_microtasks_per_drain: DEFAULT_MICROTASK_BUDGET,
            log_flushes: false,
        }
    }
}

impl SchedulerConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-drain microtask budget. Zero is clamped to one.
    #[must_use]
    pub fn with_microtask_budget(mut self, budget: usize) -> Self {
        self.max_microtasks_per_drain = budget.max(1);
        self
    }

    /// Enable or disable per-flush trace records.
    #[must_use]
    pub fn with_flush_logging(mut self, enabled: bool) -> Self {
        self.log_flushes = enabled;
        self
    }

    /// Check the configuration for unusable values.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when the microtask budget is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_microtasks_per_drain == 0 {
            return Err(ConfigError::Invalid {
                field: "max_microtasks_per_drain",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }

    /// Load from TOML text containing a `[scheduler]` table. A missing table
    /// yields the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown fields, and
    /// [`ConfigError::Invalid`] when [`validate`](Self::validate) fails.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        #[derive(serde::Deserialize, Default)]
        #[serde(default)]
        struct Document {
            scheduler: SchedulerConfig,
        }

        let doc: Document = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        doc.scheduler.validate()?;
        Ok(doc.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SchedulerConfig::new();
        assert_eq!(cfg.max_microtasks_per_drain, DEFAULT_MICROTASK_BUDGET);
        assert!(!cfg.log_flushes);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builder_clamps_zero_budget() {
        let cfg = SchedulerConfig::new().with_microtask_budget(0);
        assert_eq!(cfg.max_microtasks_per_drain, 1);
    }

    #[test]
    fn zero_budget_is_invalid() {
        let cfg = SchedulerConfig {
            max_microtasks_per_drain: 0,
            log_flushes: false,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_round_trip() {
        let cfg = SchedulerConfig::from_toml_str(
            "[scheduler]\nmax_microtasks_per_drain = 64\nlog_flushes = true\n",
        )
        .unwrap();
        assert_eq!(cfg.max_microtasks_per_drain, 64);
        assert!(cfg.log_flushes);

        assert_eq!(SchedulerConfig::from_toml_str("").unwrap(), SchedulerConfig::default());
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn toml_rejects_unknown_and_zero() {
        assert!(matches!(
            SchedulerConfig::from_toml_str("[scheduler]\nspeed = 3\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SchedulerConfig::from_toml_str("[scheduler]\nmax_microtasks_per_drain = 0\n"),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
