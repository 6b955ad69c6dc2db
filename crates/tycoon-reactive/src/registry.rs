#![forbid(unsafe_code)]

//! Observer registry: one [`Topic<P>`] per channel of shared state.
//!
//! # Design
//!
//! A [`Topic<P>`] holds the latest value of type `P` plus a set of observers
//! in shared, reference-counted storage (`Rc<RefCell<..>>`). Observers are
//! registered by `Rc` and stored as `Weak`, so the topic never keeps a
//! consumer alive. Topics with nothing to say besides "something changed" use
//! `P = ()`.
//!
//! # Invariants
//!
//! 1. An observer appears at most once per topic (identity = allocation
//!    address). Subscribing it again is a no-op.
//! 2. Unsubscribing an absent observer is a no-op.
//! 3. [`Topic::notify_all`] works on a snapshot of the subscriber set taken
//!    when it starts; observers registered or removed during the call do not
//!    change who is notified by that call, and nobody is notified twice.
//! 4. No borrow of the topic is held while hooks run, so hooks may read the
//!    topic, (un)subscribe, or publish.
//! 5. A hook that fails or panics is logged and counted; the remaining
//!    observers are still notified and the caller never sees the failure.
//!
//! # Failure Modes
//!
//! - **Dropped observer**: its `Weak` stops upgrading and is pruned at the
//!   next notification.
//! - **Observer outliving its consumer**: the observer is still called and
//!   should return [`ObserverError::Defunct`]; that is logged at `debug`.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::ObserverError;
use crate::panic_guard::contain;

/// Capability of reacting to a topic notification.
///
/// `P` is the topic payload; payload-less topics use `()`.
pub trait Observer<P: ?Sized> {
    /// Called once per notification with the topic's current value.
    ///
    /// # Errors
    ///
    /// An error is logged by the registry and otherwise ignored.
    fn update(&self, payload: &P) -> Result<(), ObserverError>;
}

/// Adapter that lets an infallible closure act as an [`Observer`].
struct FnObserver<F>(F);

impl<P, F: Fn(&P)> Observer<P> for FnObserver<F> {
    fn update(&self, payload: &P) -> Result<(), ObserverError> {
        (self.0)(payload);
        Ok(())
    }
}

type ObserverWeak<P> = Weak<dyn Observer<P>>;
type ObserverRc<P> = Rc<dyn Observer<P>>;

/// Shared interior for [`Topic<P>`].
struct TopicInner<P> {
    name: &'static str,
    current: P,
    subscribers: Vec<ObserverWeak<P>>,
}

impl<P> TopicInner<P> {
    fn position_of<O: ?Sized>(&self, observer: *const O) -> Option<usize> {
        self.subscribers
            .iter()
            .position(|w| std::ptr::addr_eq(w.as_ptr(), observer))
    }
}

/// Outcome of one [`Topic::notify_all`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Observers whose hook returned `Ok`.
    pub delivered: usize,
    /// Observers whose hook returned an error or panicked.
    pub failed: usize,
    /// Dead registrations removed before notifying.
    pub pruned: usize,
}

impl NotifyReport {
    /// Total observers invoked.
    #[must_use]
    pub fn invoked(&self) -> usize {
        self.delivered + self.failed
    }
}

/// A named channel of shared state with its own subscriber set.
///
/// Cloning a `Topic` creates a new handle to the **same** channel.
pub struct Topic<P> {
    inner: Rc<RefCell<TopicInner<P>>>,
}

impl<P> Clone for Topic<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for Topic<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Topic")
            .field("name", &inner.name)
            .field("current", &inner.current)
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

impl<P: Clone + 'static> Topic<P> {
    /// Create a topic holding `initial`, with no subscribers.
    #[must_use]
    pub fn new(name: &'static str, initial: P) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TopicInner {
                name,
                current: initial,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Label used in log records.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.borrow().name
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> P {
        self.inner.borrow().current.clone()
    }

    /// Access the current value by reference.
    ///
    /// # Panics
    ///
    /// Panics if `f` publishes, subscribes or unsubscribes on this topic;
    /// the value stays borrowed while `f` runs.
    pub fn with<R>(&self, f: impl FnOnce(&P) -> R) -> R {
        f(&self.inner.borrow().current)
    }

    /// Register `observer`. Returns `false` if it was already registered.
    ///
    /// The topic keeps only a weak reference; the caller owns the observer.
    pub fn subscribe<O: Observer<P> + 'static>(&self, observer: &Rc<O>) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.position_of(Rc::as_ptr(observer)).is_some() {
            return false;
        }
        let weak: Weak<O> = Rc::downgrade(observer);
        inner.subscribers.push(weak);
        true
    }

    /// Remove `observer`. Returns `false` if it was not registered.
    pub fn unsubscribe<O: Observer<P> + ?Sized>(&self, observer: &Rc<O>) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.position_of(Rc::as_ptr(observer)) {
            Some(idx) => {
                inner.subscribers.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Whether `observer` is currently registered.
    #[must_use]
    pub fn is_subscribed<O: Observer<P> + ?Sized>(&self, observer: &Rc<O>) -> bool {
        self.inner
            .borrow()
            .position_of(Rc::as_ptr(observer))
            .is_some()
    }

    /// Register a closure. The returned [`Subscription`] owns the closure;
    /// dropping it unsubscribes.
    pub fn subscribe_fn(&self, callback: impl Fn(&P) + 'static) -> Subscription {
        let observer: ObserverRc<P> = Rc::new(FnObserver(callback));
        let weak: ObserverWeak<P> = Rc::downgrade(&observer);
        self.inner.borrow_mut().subscribers.push(weak);

        let topic = Rc::downgrade(&self.inner);
        Subscription::from_detach(move || {
            if let Some(topic) = topic.upgrade() {
                // Busy topic: the dead weak is pruned on the next notify.
                if let Ok(mut inner) = topic.try_borrow_mut() {
                    if let Some(idx) = inner.position_of(Rc::as_ptr(&observer)) {
                        inner.subscribers.remove(idx);
                    }
                }
            }
            drop(observer);
        })
    }

    /// Number of registrations, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Replace the current value, then notify every observer.
    pub fn publish(&self, value: P) -> NotifyReport {
        self.inner.borrow_mut().current = value;
        self.notify_all()
    }

    /// Invoke every live observer's hook with the current value.
    pub fn notify_all(&self) -> NotifyReport {
        let (name, payload, observers, pruned) = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.subscribers.len();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            let pruned = before - inner.subscribers.len();
            let observers: Vec<ObserverRc<P>> =
                inner.subscribers.iter().filter_map(Weak::upgrade).collect();
            (inner.name, inner.current.clone(), observers, pruned)
        };

        if pruned > 0 {
            tracing::trace!(topic = name, pruned, "pruned dead observers");
        }

        let mut report = NotifyReport {
            pruned,
            ..NotifyReport::default()
        };
        for observer in &observers {
            match contain(|| observer.update(&payload)) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(ObserverError::Defunct)) => {
                    report.failed += 1;
                    tracing::debug!(topic = name, "notified a defunct observer");
                }
                Ok(Err(err)) => {
                    report.failed += 1;
                    tracing::warn!(topic = name, error = %err, "observer failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    tracing::error!(topic = name, panic = %panic, "observer panicked");
                }
            }
        }
        report
    }
}

/// RAII guard for a registration or any other detachable link.
///
/// Dropping the guard runs its detach action exactly once.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an arbitrary detach action.
    pub fn from_detach(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Detach now instead of at drop.
    pub fn detach(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
