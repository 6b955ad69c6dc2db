#![forbid(unsafe_code)]

//! Per-component lifecycle management for observers.
//!
//! A consumer (page, panel, widget) creates one [`ObserverScope`], attaches
//! everything it listens to through it, and drops it on teardown. Every
//! registration, closure subscription and signal bridge held by the scope is
//! detached at that point.
//!
//! # Invariants
//!
//! 1. Links are released in reverse registration order on drop.
//! 2. After drop or [`clear`](ObserverScope::clear), nothing attached
//!    through the scope fires again.
//! 3. A cleared scope is reusable.

use std::fmt;
use std::rc::Rc;

use crate::bridge::SignalBridge;
use crate::registry::{Observer, Subscription, Topic};

/// Collects subscriptions for a logical consumer.
pub struct ObserverScope {
    links: Vec<Subscription>,
}

impl ObserverScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Keep `sub` alive until the scope is dropped or cleared.
    pub fn hold(&mut self, sub: Subscription) -> &mut Self {
        self.links.push(sub);
        self
    }

    /// Subscribe a closure to `topic` for the lifetime of the scope.
    pub fn observe<P: Clone + 'static>(
        &mut self,
        topic: &Topic<P>,
        callback: impl Fn(&P) + 'static,
    ) -> &mut Self {
        let sub = topic.subscribe_fn(callback);
        self.hold(sub)
    }

    /// Register a shared observer with `topic`; the scope unregisters it on
    /// teardown. An observer that was already registered by someone else is
    /// left alone: its registration belongs to that owner.
    pub fn attach<P: Clone + 'static, O: Observer<P> + 'static>(
        &mut self,
        topic: &Topic<P>,
        observer: &Rc<O>,
    ) -> &mut Self {
        if !topic.subscribe(observer) {
            return self;
        }
        let topic = topic.clone();
        let observer = Rc::downgrade(observer);
        self.hold(Subscription::from_detach(move || {
            if let Some(observer) = observer.upgrade() {
                topic.unsubscribe(&observer);
            }
        }))
    }

    /// Keep a signal bridge alive for the lifetime of the scope.
    pub fn bridge(&mut self, bridge: SignalBridge) -> &mut Self {
        self.hold(bridge.into_subscription())
    }

    /// Number of held links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Release every link now; the scope stays usable.
    pub fn clear(&mut self) {
        while let Some(link) = self.links.pop() {
            drop(link);
        }
    }
}

impl Drop for ObserverScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl Default for ObserverScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObserverScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverScope")
            .field("links", &self.links.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
