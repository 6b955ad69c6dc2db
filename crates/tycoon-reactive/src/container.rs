#![forbid(unsafe_code)]

//! Batched mutation container.
//!
//! # Design
//!
//! [`Reactive<T>`] composes a caller-supplied value with a `pending` flag and
//! a [`Revision`] counter. Mutations go through
//! [`request_update`](Reactive::request_update), which applies them
//! immediately and defers only the notification: the first request of a burst
//! queues one flush microtask on the injected [`Scheduler`], later requests
//! in the same burst see `pending` already set and queue nothing.
//!
//! A flush runs these steps in order:
//!
//! 1. `pending` goes back to `false`.
//! 2. `revision` increases by exactly 1.
//! 3. The notify hook runs once (panics contained and logged).
//! 4. Every attached revision sink receives the new revision. This is how a
//!    [`SignalBridge`](crate::SignalBridge) writes its declared slot, and it is
//!    always the last step.
//!
//! ```text
//!   Idle ──request_update──▶ Pending ──flush──▶ Idle
//!                             │   ▲
//!                             └───┘ request_update (coalesced)
//! ```
//!
//! # Failure Modes
//!
//! - **Mutation panics or returns `Err`** (via
//!   [`try_request_update`](Reactive::try_request_update)): the failure
//!   reaches the caller and this attempt schedules nothing. A flush queued by
//!   an earlier request still runs.
//! - **Container dropped before its flush**: the queued flush only holds a
//!   weak reference and does nothing.
//! - **Re-entrant mutation from the hook**: allowed; it starts a new burst
//!   and a second flush in the same drain.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::panic_guard::contain;
use crate::registry::Topic;
use crate::scheduler::Scheduler;

/// Flush counter of a [`Reactive`] container.
///
/// Increments wrap at `u64::MAX` back to zero, so the value still changes on
/// every flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(u64);

impl Revision {
    /// Revision of a container that has never flushed.
    pub const INITIAL: Self = Self(0);

    /// Wrap a raw counter value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The revision after one more flush.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Scheduling state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// No flush outstanding.
    Idle,
    /// A flush is queued and has not run yet.
    Pending,
}

type NotifyHook<T> = Rc<dyn Fn(&Reactive<T>)>;
type RevisionSink = Rc<dyn Fn(Revision)>;

/// Identifier of an attached revision sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SinkId(u64);

struct ReactiveInner<T> {
    label: Cell<&'static str>,
    value: RefCell<T>,
    revision: Cell<Revision>,
    pending: Cell<bool>,
    notify: RefCell<Option<NotifyHook<T>>>,
    sinks: RefCell<Vec<(SinkId, RevisionSink)>>,
    next_sink: Cell<u64>,
    scheduler: Scheduler,
}

/// A mutable value whose change notifications are batched per scheduler
/// turn.
///
/// Cloning a `Reactive` creates a new handle to the **same** container.
pub struct Reactive<T> {
    inner: Rc<ReactiveInner<T>>,
}

impl<T> Clone for Reactive<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Reactive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("label", &self.inner.label.get())
            .field("value", &self.inner.value.borrow())
            .field("revision", &self.inner.revision.get())
            .field("pending", &self.inner.pending.get())
            .finish()
    }
}

impl<T: 'static> Reactive<T> {
    /// Wrap `value`. Flushes are queued on `scheduler`.
    #[must_use]
    pub fn new(scheduler: &Scheduler, value: T) -> Self {
        Self {
            inner: Rc::new(ReactiveInner {
                label: Cell::new("reactive"),
                value: RefCell::new(value),
                revision: Cell::new(Revision::INITIAL),
                pending: Cell::new(false),
                notify: RefCell::new(None),
                sinks: RefCell::new(Vec::new()),
                next_sink: Cell::new(0),
                scheduler: scheduler.clone(),
            }),
        }
    }

    /// Set the label used in log records.
    #[must_use]
    pub fn with_label(self, label: &'static str) -> Self {
        self.inner.label.set(label);
        self
    }

    /// Builder form of [`set_notify`](Self::set_notify).
    #[must_use]
    pub fn with_notify(self, hook: impl Fn(&Reactive<T>) + 'static) -> Self {
        self.set_notify(hook);
        self
    }

    /// Install the hook run once per flush, replacing any previous one.
    ///
    /// The hook receives the container so it can read the settled value.
    pub fn set_notify(&self, hook: impl Fn(&Reactive<T>) + 'static) {
        *self.inner.notify.borrow_mut() = Some(Rc::new(hook));
    }

    /// Route every flush into `topic` by publishing the new revision.
    pub fn notify_topic(&self, topic: &Topic<Revision>) {
        let topic = topic.clone();
        self.set_notify(move |container| {
            topic.publish(container.revision());
        });
    }

    /// Remove the notify hook.
    pub fn clear_notify(&self) {
        self.inner.notify.borrow_mut().take();
    }

    /// Label used in log records.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.inner.label.get()
    }

    /// The scheduler flushes are queued on.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Read the wrapped value by reference.
    ///
    /// # Panics
    ///
    /// Panics if called from inside the closure passed to
    /// [`request_update`](Self::request_update) on the same container.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Number of completed flushes (wrapping).
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.inner.revision.get()
    }

    /// Whether a flush is queued.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get()
    }

    /// Scheduling state.
    #[must_use]
    pub fn state(&self) -> ContainerState {
        if self.is_pending() {
            ContainerState::Pending
        } else {
            ContainerState::Idle
        }
    }

    /// Apply `mutate` now and make sure a flush is queued.
    ///
    /// Returns whatever `mutate` returns. Only the first request of a burst
    /// queues a flush; later ones rely on it observing their in-place
    /// changes.
    pub fn request_update<R>(&self, mutate: impl FnOnce(&mut T) -> R) -> R {
        let out = mutate(&mut self.inner.value.borrow_mut());
        self.schedule_flush();
        out
    }

    /// Fallible [`request_update`](Self::request_update). On `Err` nothing is
    /// scheduled by this attempt and the error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Whatever `mutate` returns.
    pub fn try_request_update<R, E>(
        &self,
        mutate: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Result<R, E> {
        let out = mutate(&mut self.inner.value.borrow_mut())?;
        self.schedule_flush();
        Ok(out)
    }

    /// Replace the wrapped value (write-through with flush scheduling).
    pub fn set(&self, value: T) {
        self.request_update(|v| *v = value);
    }

    pub(crate) fn add_revision_sink(&self, sink: impl Fn(Revision) + 'static) -> SinkId {
        let id = SinkId(self.inner.next_sink.get());
        self.inner.next_sink.set(id.0 + 1);
        self.inner.sinks.borrow_mut().push((id, Rc::new(sink)));
        id
    }

    pub(crate) fn remove_revision_sink(&self, id: SinkId) -> bool {
        let mut sinks = self.inner.sinks.borrow_mut();
        let before = sinks.len();
        sinks.retain(|(sid, _)| *sid != id);
        sinks.len() != before
    }

    pub(crate) fn downgrade(&self) -> WeakReactive<T> {
        WeakReactive {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn schedule_flush(&self) {
        if self.inner.pending.replace(true) {
            return;
        }
        let weak = self.downgrade();
        let label = self.label();
        self.inner.scheduler.queue_microtask(move || match weak.upgrade() {
            Some(container) => container.flush(),
            None => tracing::trace!(container = label, "container dropped before flush"),
        });
    }

    fn flush(&self) {
        self.inner.pending.set(false);
        let revision = self.inner.revision.get().next();
        self.inner.revision.set(revision);

        if self.inner.scheduler.config().log_flushes {
            tracing::trace!(container = self.label(), %revision, "flush");
        }

        let hook = self.inner.notify.borrow().clone();
        if let Some(hook) = hook {
            if let Err(panic) = contain(|| hook(self)) {
                tracing::error!(container = self.label(), %revision, panic = %panic, "notify hook panicked");
            }
        }

        let sinks: Vec<RevisionSink> = self
            .inner
            .sinks
            .borrow()
            .iter()
            .map(|(_, sink)| Rc::clone(sink))
            .collect();
        for sink in sinks {
            if let Err(panic) = contain(|| sink(revision)) {
                tracing::error!(container = self.label(), %revision, panic = %panic, "revision sink panicked");
            }
        }
    }
}

impl<T: Clone + 'static> Reactive<T> {
    /// Clone of the wrapped value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

/// Non-owning handle to a [`Reactive`] container.
pub(crate) struct WeakReactive<T> {
    inner: Weak<ReactiveInner<T>>,
}

impl<T> WeakReactive<T> {
    pub(crate) fn upgrade(&self) -> Option<Reactive<T>> {
        self.inner.upgrade().map(|inner| Reactive { inner })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
