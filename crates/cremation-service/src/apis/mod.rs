//! Route implementations for the tracking API.

pub mod order;
pub mod tracking;
