//! Enrichment pipeline configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pause before each enrichment call (milliseconds), to stay under
    /// provider rate limits.
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Upper bound on leads per run, whatever the request asks for.
    #[serde(default = "default_max_leads")]
    pub max_leads: usize,

    /// How many recent lead names are sent as the extraction exclusion list.
    #[serde(default = "default_exclude_history")]
    pub exclude_history: usize,
}

fn default_pacing_delay_ms() -> u64 {
    150
}

fn default_max_leads() -> usize {
    50
}

fn default_exclude_history() -> usize {
    40
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing_delay_ms: default_pacing_delay_ms(),
            max_leads: default_max_leads(),
            exclude_history: default_exclude_history(),
        }
    }
}

impl PipelineConfig {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.pacing_delay(), Duration::from_millis(150));
        assert_eq!(config.max_leads, 50);
        assert_eq!(config.exclude_history, 40);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: PipelineConfig = toml::from_str("max_leads = 10").unwrap();
        assert_eq!(config.max_leads, 10);
        assert_eq!(config.pacing_delay_ms, 150);
    }
}
