//! Common types module for the cremation order tracking system.
//!
//! This module defines the core data types and structures shared by every
//! crate in the workspace: service orders and their status progression,
//! HTTP request/response schemas, storage namespaces, engine events and the
//! configuration validation framework.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Event types broadcast when orders change.
pub mod events;
/// Service order types including the status enumeration and timeline steps.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions shared across crates.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use utils::{current_timestamp, truncate_id};
pub use validation::*;
