//! Dispatch loop configuration.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Lower bound of the pause after a successful send (seconds).
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: u64,

    /// Upper bound of the pause after a successful send (seconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,

    /// Fixed pause after a failed send (seconds).
    #[serde(default = "default_failure_delay")]
    pub failure_delay_secs: u64,

    /// Log entries kept in memory.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

fn default_min_delay() -> u64 {
    420 // 7 minutes
}

fn default_max_delay() -> u64 {
    540 // 9 minutes
}

fn default_failure_delay() -> u64 {
    60
}

fn default_log_capacity() -> usize {
    200
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            failure_delay_secs: default_failure_delay(),
            log_capacity: default_log_capacity(),
        }
    }
}

impl DispatchConfig {
    /// Uniformly random pause in `[min_delay_secs, max_delay_secs]`.
    pub fn success_delay(&self) -> Duration {
        let secs = if self.min_delay_secs >= self.max_delay_secs {
            self.min_delay_secs
        } else {
            rand::thread_rng().gen_range(self.min_delay_secs..=self.max_delay_secs)
        };
        Duration::from_secs(secs)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_secs(self.failure_delay_secs)
    }
}
