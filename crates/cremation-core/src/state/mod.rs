//! State management for service orders.
//!
//! Provides the state machine that guards status transitions and owns
//! order persistence, including the folio index.

pub mod order;

pub use order::{OrderStateError, OrderStateMachine};
