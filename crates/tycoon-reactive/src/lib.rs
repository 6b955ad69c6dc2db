#![forbid(unsafe_code)]

//! Reactive update core for the Tycoon presentation layer.
//!
//! Components subscribe to shared mutable state and re-render when it
//! changes. This crate provides the pieces that make that cheap:
//!
//! - [`Topic`] and [`Observer`]: per-channel observer registry with
//!   failure containment.
//! - [`Scheduler`]: explicit single-threaded event loop with a microtask
//!   queue drained ahead of timers.
//! - [`Reactive`]: mutable container that coalesces bursts of synchronous
//!   mutations into one deferred flush and counts flushes as [`Revision`]s.
//! - [`SignalBridge`] and [`DeclaredProperty`]: expose a container's revision
//!   to a host that only reacts to declared property changes.
//! - [`ObserverScope`]: ties every link a consumer creates to its lifetime.
//!
//! # Architecture
//!
//! Everything is `Rc<RefCell<..>>`-based and single-threaded. Nothing is
//! global: the scheduler, topics and containers are handed to consumers
//! explicitly.
//!
//! ```text
//!   request_update ─▶ Reactive (pending) ─▶ Scheduler microtask
//!                                                 │
//!                      flush: revision += 1 ◀─────┘
//!                         ├─▶ notify hook ─▶ Topic::notify_all ─▶ observers
//!                         └─▶ SignalBridge ─▶ DeclaredProperty ─▶ host
//! ```
//!
//! # Invariants
//!
//! 1. N synchronous `request_update` calls produce exactly one flush, after
//!    the last mutation.
//! 2. Bursts separated by a scheduler turn flush separately.
//! 3. A failing or panicking observer never prevents its siblings from
//!    being notified, and never reaches the mutating caller.
//! 4. A bridged slot moves by exactly one revision per flush and at no
//!    other time.

pub mod bridge;
pub mod config;
pub mod container;
pub mod error;
#[cfg(feature = "tracing-json")]
pub mod logging;
mod panic_guard;
pub mod registry;
pub mod scheduler;
pub mod scope;

pub use bridge::{DeclaredProperty, HostWatcher, SignalBridge};
pub use config::SchedulerConfig;
pub use container::{ContainerState, Reactive, Revision};
pub use error::{ConfigError, ObserverError, SchedulerError};
pub use registry::{NotifyReport, Observer, Subscription, Topic};
pub use scheduler::{Scheduler, SchedulerStats, TimerId};
pub use scope::ObserverScope;
