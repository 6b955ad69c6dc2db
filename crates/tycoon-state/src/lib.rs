#![forbid(unsafe_code)]

//! Shared-state topics for the Tycoon presentation layer.
//!
//! Three channels, all built on [`tycoon_reactive`]:
//!
//! | Topic | Payload | Type |
//! |-------|---------|------|
//! | Simulation state | latest flushed [`Revision`](tycoon_reactive::Revision) | [`SimulationStore`] |
//! | Persistence state | [`SaveStatus`] | [`PersistenceTopic`] |
//! | Query string | none | [`QueryTopic`] |
//!
//! Each is an explicit value handed to the pages that need it.

pub mod persistence;
pub mod query;
pub mod simulation;

pub use persistence::{
    IndicatorView, PersistenceTopic, SaveIndicator, SaveIndicatorConfig, SaveStatus,
    UnknownSaveStatus,
};
pub use query::{QueryParams, QueryTopic};
pub use simulation::SimulationStore;
