//! Core tracking engine for cremation service orders.
//!
//! Contains the order state machine that guards status transitions, the
//! pure timeline projection and search filter, the `TrackingEngine` facade
//! used by the HTTP layer, and the builder that wires storage backends from
//! configuration.

pub mod builder;
pub mod engine;
pub mod filter;
pub mod state;
pub mod timeline;

pub use builder::{BuilderError, EngineBuilder, EngineFactories};
pub use engine::{event_bus::EventBus, EngineError, TrackingEngine};
pub use filter::filter;
pub use state::{OrderStateError, OrderStateMachine};
pub use timeline::{project, project_phases};
