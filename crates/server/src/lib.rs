//! HTTP surface of the prospector service.

pub mod api;
pub mod metrics;
pub mod persist;
pub mod state;
