//! Autonomous outreach dispatch.
//!
//! A single background task sends queued leads one at a time, rotating through
//! the sender pool. After a success it waits a randomized interval, after a
//! failure a fixed shorter one. An empty queue or an empty sender pool stops
//! the loop.

mod config;
pub mod rotation;
mod runner;
mod types;

pub use config::DispatchConfig;
pub use rotation::{active_index, next_cursor, rotate_cursor, RotationError};
pub use runner::DispatchLoop;
pub use types::{
    DispatchError, DispatchEvent, DispatchLogEntry, DispatchOutcome, DispatchStatus, LogLevel,
};
