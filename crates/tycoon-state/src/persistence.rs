#![forbid(unsafe_code)]

//! Persistence-state topic and the transient "saved" indicator.
//!
//! The save layer itself lives elsewhere; it only reports its condition
//! through [`PersistenceTopic::report`]. How long a "saved" badge stays on
//! screen is the subscriber's business, so [`SaveIndicator`] owns its own
//! reset timer on the injected [`Scheduler`].

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tycoon_reactive::{
    NotifyReport, Observer, ObserverError, Scheduler, Subscription, TimerId, Topic,
};

/// Condition reported by the save layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SaveStatus {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A save is in progress.
    Saving,
    /// The last save completed.
    Saved,
    /// The last save failed.
    Error,
}

impl SaveStatus {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Saving => "saving",
            Self::Saved => "saved",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name that is not one of the four save conditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown save status `{0}`")]
pub struct UnknownSaveStatus(pub String);

impl FromStr for SaveStatus {
    type Err = UnknownSaveStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "saving" => Ok(Self::Saving),
            "saved" => Ok(Self::Saved),
            "error" => Ok(Self::Error),
            other => Err(UnknownSaveStatus(other.to_string())),
        }
    }
}

/// Topic carrying the save layer's current [`SaveStatus`].
#[derive(Clone, Debug)]
pub struct PersistenceTopic {
    topic: Topic<SaveStatus>,
}

impl Default for PersistenceTopic {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceTopic {
    /// Topic starting at [`SaveStatus::Idle`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            topic: Topic::new("persistence", SaveStatus::Idle),
        }
    }

    /// Publish a new condition to every observer.
    pub fn report(&self, status: SaveStatus) -> NotifyReport {
        tracing::debug!(%status, "save status");
        self.topic.publish(status)
    }

    /// Last reported condition.
    #[must_use]
    pub fn status(&self) -> SaveStatus {
        self.topic.get()
    }

    /// Underlying topic.
    #[must_use]
    pub fn topic(&self) -> &Topic<SaveStatus> {
        &self.topic
    }

    /// Register an observer.
    pub fn subscribe<O: Observer<SaveStatus> + 'static>(&self, observer: &Rc<O>) -> bool {
        self.topic.subscribe(observer)
    }

    /// Remove an observer.
    pub fn unsubscribe<O: Observer<SaveStatus> + ?Sized>(&self, observer: &Rc<O>) -> bool {
        self.topic.unsubscribe(observer)
    }

    /// Register a closure.
    pub fn subscribe_fn(&self, callback: impl Fn(&SaveStatus) + 'static) -> Subscription {
        self.topic.subscribe_fn(callback)
    }
}

/// Tunables for [`SaveIndicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveIndicatorConfig {
    /// How long the "saved" badge stays up.
    pub reset_after: Duration,
}

impl Default for SaveIndicatorConfig {
    fn default() -> Self {
        Self {
            reset_after: Duration::from_secs(2),
        }
    }
}

impl SaveIndicatorConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long the "saved" badge stays up.
    #[must_use]
    pub fn with_reset_after(mut self, reset_after: Duration) -> Self {
        self.reset_after = reset_after;
        self
    }
}

/// What the indicator currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorView {
    /// Nothing.
    Hidden,
    /// "Saving…"
    Saving,
    /// "Saved", until the reset timer fires.
    Saved,
    /// "Save failed", until the next report.
    Failed,
}

/// Subscriber that turns save conditions into a transient badge.
pub struct SaveIndicator {
    scheduler: Scheduler,
    config: SaveIndicatorConfig,
    view: Cell<IndicatorView>,
    saved_seen: Cell<u32>,
    reset: Cell<Option<TimerId>>,
    me: Weak<SaveIndicator>,
}

impl fmt::Debug for SaveIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveIndicator")
            .field("view", &self.view.get())
            .field("saved_seen", &self.saved_seen.get())
            .field("reset_armed", &self.reset.get().is_some())
            .finish()
    }
}

impl SaveIndicator {
    /// Create an indicator that arms its reset timers on `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, config: SaveIndicatorConfig) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            scheduler: scheduler.clone(),
            config,
            view: Cell::new(IndicatorView::Hidden),
            saved_seen: Cell::new(0),
            reset: Cell::new(None),
            me: me.clone(),
        })
    }

    /// Current badge.
    #[must_use]
    pub fn view(&self) -> IndicatorView {
        self.view.get()
    }

    /// How many `Saved` notifications arrived.
    #[must_use]
    pub fn saved_seen(&self) -> u32 {
        self.saved_seen.get()
    }

    fn disarm(&self) {
        if let Some(id) = self.reset.take() {
            self.scheduler.clear_timeout(id);
        }
    }

    fn arm_reset(&self) {
        self.disarm();
        let me = self.me.clone();
        let id = self.scheduler.set_timeout(self.config.reset_after, move || {
            // The indicator may be gone by the time the timer fires.
            if let Some(me) = me.upgrade() {
                me.reset.set(None);
                if me.view.get() == IndicatorView::Saved {
                    me.view.set(IndicatorView::Hidden);
                }
            }
        });
        self.reset.set(Some(id));
    }
}

impl Observer<SaveStatus> for SaveIndicator {
    fn update(&self, status: &SaveStatus) -> Result<(), ObserverError> {
        match status {
            SaveStatus::Idle => {
                self.disarm();
                self.view.set(IndicatorView::Hidden);
            }
            SaveStatus::Saving => {
                self.disarm();
                self.view.set(IndicatorView::Saving);
            }
            SaveStatus::Saved => {
                self.saved_seen.set(self.saved_seen.get() + 1);
                self.view.set(IndicatorView::Saved);
                self.arm_reset();
            }
            SaveStatus::Error => {
                self.disarm();
                self.view.set(IndicatorView::Failed);
            }
        }
        Ok(())
    }
}

impl Drop for SaveIndicator {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_round_trip() {
        for status in [
            SaveStatus::Idle,
            SaveStatus::Saving,
            SaveStatus::Saved,
            SaveStatus::Error,
        ] {
            assert_eq!(status.to_string().parse::<SaveStatus>(), Ok(status));
        }
        assert_eq!(
            "Saved".parse::<SaveStatus>(),
            Err(UnknownSaveStatus("Saved".to_string()))
        );
    }

    #[test]
    fn saving_then_saved_seen_once_and_resets() {
        let sched = Scheduler::new();
        let topic = PersistenceTopic::new();
        let indicator = SaveIndicator::new(
            &sched,
            SaveIndicatorConfig::new().with_reset_after(Duration::from_millis(1_500)),
        );
        topic.subscribe(&indicator);

        topic.report(SaveStatus::Saving);
        assert_eq!(indicator.view(), IndicatorView::Saving);

        let t = topic.clone();
        sched.set_timeout(Duration::from_millis(10), move || {
            t.report(SaveStatus::Saved);
        });
        sched.advance(Duration::from_millis(10)).unwrap();
        assert_eq!(indicator.view(), IndicatorView::Saved);
        assert_eq!(indicator.saved_seen(), 1);

        sched.advance(Duration::from_millis(1_499)).unwrap();
        assert_eq!(indicator.view(), IndicatorView::Saved);
        sched.advance(Duration::from_millis(1)).unwrap();
        assert_eq!(indicator.view(), IndicatorView::Hidden);
        assert_eq!(indicator.saved_seen(), 1);
        assert_eq!(topic.status(), SaveStatus::Saved);
    }

    #[test]
    fn new_save_restarts_reset_timer() {
        let sched = Scheduler::new();
        let topic = PersistenceTopic::new();
        let indicator = SaveIndicator::new(&sched, SaveIndicatorConfig::default());
        topic.subscribe(&indicator);

        topic.report(SaveStatus::Saved);
        sched.advance(Duration::from_millis(1_500)).unwrap();
        topic.report(SaveStatus::Saved);
        sched.advance(Duration::from_millis(1_500)).unwrap();
        assert_eq!(indicator.view(), IndicatorView::Saved);
        assert_eq!(sched.pending_timers(), 1);

        sched.run_until_idle().unwrap();
        assert_eq!(indicator.view(), IndicatorView::Hidden);
        assert_eq!(indicator.saved_seen(), 2);
    }

    #[test]
    fn error_is_sticky_until_next_report() {
        let sched = Scheduler::new();
        let topic = PersistenceTopic::new();
        let indicator = SaveIndicator::new(&sched, SaveIndicatorConfig::default());
        topic.subscribe(&indicator);

        topic.report(SaveStatus::Saved);
        topic.report(SaveStatus::Error);
        sched.run_until_idle().unwrap();
        assert_eq!(indicator.view(), IndicatorView::Failed);

        topic.report(SaveStatus::Idle);
        assert_eq!(indicator.view(), IndicatorView::Hidden);
    }

    #[test]
    fn indicator_owned_by_cleared_timer_drops_cleanly() {
        let sched = Scheduler::new();
        let topic = PersistenceTopic::new();
        let indicator = SaveIndicator::new(&sched, SaveIndicatorConfig::default());
        topic.subscribe(&indicator);
        topic.report(SaveStatus::Saved);

        let id = sched.set_timeout(Duration::from_secs(5), move || drop(indicator));
        assert_eq!(sched.pending_timers(), 2);
        assert!(sched.clear_timeout(id));
        assert_eq!(sched.pending_timers(), 0);
    }

    #[test]
    fn dropped_indicator_disarms_timer() {
        let sched = Scheduler::new();
        let topic = PersistenceTopic::new();
        let indicator = SaveIndicator::new(&sched, SaveIndicatorConfig::default());
        topic.subscribe(&indicator);
        topic.report(SaveStatus::Saved);
        assert_eq!(sched.pending_timers(), 1);

        drop(indicator);
        assert_eq!(sched.pending_timers(), 0);
        assert_eq!(topic.report(SaveStatus::Saved).pruned, 1);
    }
}
