#![forbid(unsafe_code)]

//! Simulation-state topic.
//!
//! The game simulation is an opaque value of type `S`. [`SimulationStore`]
//! wraps it in a [`Reactive`] container so a burst of edits from one input
//! event produces one notification, and publishes each flush's [`Revision`]
//! on its topic. Observers re-read the state through the store they were
//! handed; the payload only says which flush they are looking at.

use std::fmt;
use std::rc::Rc;

use tycoon_reactive::{
    NotifyReport, Observer, Reactive, Revision, Scheduler, SignalBridge, Subscription, Topic,
};

/// Shared simulation state plus its change topic.
pub struct SimulationStore<S> {
    state: Reactive<S>,
    topic: Topic<Revision>,
}

impl<S> Clone for SimulationStore<S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            topic: self.topic.clone(),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for SimulationStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationStore")
            .field("state", &self.state)
            .field("subscribers", &self.topic.subscriber_count())
            .finish()
    }
}

impl<S: 'static> SimulationStore<S> {
    /// Wrap `initial`, queueing flushes on `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, initial: S) -> Self {
        let topic = Topic::new("simulation", Revision::INITIAL);
        let state = Reactive::new(scheduler, initial).with_label("simulation");
        state.notify_topic(&topic);
        Self { state, topic }
    }

    /// Apply an edit now; observers hear about it once the burst flushes.
    pub fn mutate<R>(&self, edit: impl FnOnce(&mut S) -> R) -> R {
        self.state.request_update(edit)
    }

    /// Fallible [`mutate`](Self::mutate); an `Err` schedules nothing.
    ///
    /// # Errors
    ///
    /// Whatever `edit` returns.
    pub fn try_mutate<R, E>(&self, edit: impl FnOnce(&mut S) -> Result<R, E>) -> Result<R, E> {
        self.state.try_request_update(edit)
    }

    /// Read the state.
    pub fn with<R>(&self, read: impl FnOnce(&S) -> R) -> R {
        self.state.with(read)
    }

    /// Revision of the last completed flush.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.state.revision()
    }

    /// Whether edits are waiting to be flushed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Change topic; its value is the latest flushed revision.
    #[must_use]
    pub fn topic(&self) -> &Topic<Revision> {
        &self.topic
    }

    /// Register an observer on the change topic.
    pub fn subscribe<O: Observer<Revision> + 'static>(&self, observer: &Rc<O>) -> bool {
        self.topic.subscribe(observer)
    }

    /// Remove an observer from the change topic.
    pub fn unsubscribe<O: Observer<Revision> + ?Sized>(&self, observer: &Rc<O>) -> bool {
        self.topic.unsubscribe(observer)
    }

    /// Register a closure on the change topic.
    pub fn subscribe_fn(&self, callback: impl Fn(&Revision) + 'static) -> Subscription {
        self.topic.subscribe_fn(callback)
    }

    /// Notify observers without a flush, e.g. after a page attaches late.
    pub fn renotify(&self) -> NotifyReport {
        self.topic.notify_all()
    }

    /// Bridge this store's revisions into a declared host property.
    pub fn bridge(&self, property: &'static str) -> SignalBridge {
        SignalBridge::declare(&self.state, property)
    }
}

impl<S: Clone + 'static> SimulationStore<S> {
    /// Clone of the whole state.
    #[must_use]
    pub fn snapshot(&self) -> S {
        self.state.get()
    }
}
