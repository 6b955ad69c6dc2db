#![forbid(unsafe_code)]

//! Signal bridge between [`Reactive`] containers and an external rendering
//! host.
//!
//! Some hosts only re-render when a *declared* property changes value; they
//! cannot see in-place mutation of the data behind it. The bridge routes
//! every flush of a container through one declared counter slot:
//!
//! ```text
//!   request_update ─▶ flush ─▶ revision += 1 ─▶ DeclaredProperty<Revision> ─▶ host
//! ```
//!
//! # Invariants
//!
//! 1. The slot changes only as the last step of a flush of the bridged
//!    container.
//! 2. Each flush moves the slot forward by exactly one revision, so two
//!    flushes between host checks can never cancel out the way a toggled
//!    flag would.
//! 3. Dropping the [`SignalBridge`] stops further writes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::container::{Reactive, Revision};
use crate::error::ObserverError;
use crate::registry::{NotifyReport, Observer, Subscription, Topic};

/// An externally declared property.
///
/// Writing a value equal to the current one is invisible to the host; any
/// other write notifies every watcher.
pub struct DeclaredProperty<V> {
    topic: Topic<V>,
}

impl<V> Clone for DeclaredProperty<V> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic.clone(),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for DeclaredProperty<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeclaredProperty").field(&self.topic).finish()
    }
}

impl<V: Clone + PartialEq + 'static> DeclaredProperty<V> {
    /// Declare a property named `name` holding `initial`.
    #[must_use]
    pub fn new(name: &'static str, initial: V) -> Self {
        Self {
            topic: Topic::new(name, initial),
        }
    }

    /// Property name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.topic.name()
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> V {
        self.topic.get()
    }

    /// Write `value`. Returns the notification report if it differed from
    /// the current value, `None` otherwise.
    pub fn set(&self, value: V) -> Option<NotifyReport> {
        if self.topic.with(|current| *current == value) {
            return None;
        }
        Some(self.topic.publish(value))
    }

    /// Register a host-side watcher.
    pub fn watch<O: Observer<V> + 'static>(&self, watcher: &Rc<O>) -> bool {
        self.topic.subscribe(watcher)
    }

    /// Remove a host-side watcher.
    pub fn unwatch<O: Observer<V> + ?Sized>(&self, watcher: &Rc<O>) -> bool {
        self.topic.unsubscribe(watcher)
    }
}

/// Minimal model of a rendering host watching a declared property.
///
/// It re-renders on every reported change and remembers the last value it
/// rendered with, which is all it needs to answer "did this change".
pub struct HostWatcher<V> {
    renders: Cell<u64>,
    last_seen: RefCell<Option<V>>,
    on_render: Option<Box<dyn Fn(&V)>>,
}

impl<V: fmt::Debug> fmt::Debug for HostWatcher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostWatcher")
            .field("renders", &self.renders.get())
            .field("last_seen", &self.last_seen.borrow())
            .finish_non_exhaustive()
    }
}

impl<V: Clone + PartialEq> HostWatcher<V> {
    /// Watcher that only records renders.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            renders: Cell::new(0),
            last_seen: RefCell::new(None),
            on_render: None,
        })
    }

    /// Watcher that also runs `render` on each change.
    #[must_use]
    pub fn with_render(render: impl Fn(&V) + 'static) -> Rc<Self> {
        Rc::new(Self {
            renders: Cell::new(0),
            last_seen: RefCell::new(None),
            on_render: Some(Box::new(render)),
        })
    }

    /// Renders triggered so far.
    #[must_use]
    pub fn renders(&self) -> u64 {
        self.renders.get()
    }

    /// Value used by the most recent render.
    #[must_use]
    pub fn last_seen(&self) -> Option<V> {
        self.last_seen.borrow().clone()
    }

    /// Whether `current` differs from what the host last rendered.
    #[must_use]
    pub fn is_stale(&self, current: &V) -> bool {
        self.last_seen.borrow().as_ref() != Some(current)
    }
}

impl<V: Clone + PartialEq> Observer<V> for HostWatcher<V> {
    fn update(&self, payload: &V) -> Result<(), ObserverError> {
        self.renders.set(self.renders.get() + 1);
        *self.last_seen.borrow_mut() = Some(payload.clone());
        if let Some(render) = &self.on_render {
            render(payload);
        }
        Ok(())
    }
}

/// Link that mirrors a container's revision into a declared property.
#[must_use = "dropping a SignalBridge detaches it"]
pub struct SignalBridge {
    property: DeclaredProperty<Revision>,
    link: Subscription,
}

impl fmt::Debug for SignalBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalBridge")
            .field("property", &self.property.name())
            .field("revision", &self.property.get())
            .finish()
    }
}

impl SignalBridge {
    /// Declare a new property named `name`, seeded with the container's
    /// current revision, and bridge the container into it.
    pub fn declare<T: 'static>(container: &Reactive<T>, name: &'static str) -> Self {
        let property = DeclaredProperty::new(name, container.revision());
        Self::attach(container, &property)
    }

    /// Bridge `container` into an existing property. The property is not
    /// written until the container's next flush.
    pub fn attach<T: 'static>(container: &Reactive<T>, property: &DeclaredProperty<Revision>) -> Self {
        let slot = property.clone();
        let id = container.add_revision_sink(move |revision| {
            slot.set(revision);
        });
        let weak = container.downgrade();
        let link = Subscription::from_detach(move || {
            if let Some(container) = weak.upgrade() {
                container.remove_revision_sink(id);
            }
        });
        tracing::debug!(container = container.label(), property = property.name(), "bridge attached");
        Self {
            property: property.clone(),
            link,
        }
    }

    /// The declared slot the host watches.
    #[must_use]
    pub fn property(&self) -> &DeclaredProperty<Revision> {
        &self.property
    }

    /// Keep the link alive inside an [`ObserverScope`](crate::ObserverScope)
    /// or similar holder, dropping direct access to the property.
    pub fn into_subscription(self) -> Subscription {
        self.link
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
