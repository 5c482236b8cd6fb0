#![warn(clippy::unwrap_used)]

pub mod catalog;
pub mod engine;
pub mod service;
pub mod store;

pub use catalog::{PointSchedule, ReferenceData, TierCatalog, TierJourneyGraph};
pub use engine::{TierTransitionEngine, Transition, TransitionPolicy};
pub use service::LoyaltyService;
pub use store::{CustomerStateStore, HistoryStore, InMemoryHistoryStore, InMemoryStateStore};
