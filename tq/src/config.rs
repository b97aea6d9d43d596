//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Wall-clock budget per tick in milliseconds
    #[serde(default = "default_tick_budget_ms")]
    pub tick_budget_ms: u64,

    /// Delay before the next tick while work remains
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Delay before the next tick once every queue group is empty
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,
}

fn default_tick_budget_ms() -> u64 {
    40
}

fn default_min_delay_ms() -> u64 {
    1
}

fn default_idle_delay_ms() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_budget_ms: 40,
            min_delay_ms: 1,
            idle_delay_ms: 100,
        }
    }
}

impl SchedulerConfig {
    /// Get the per-tick budget as fractional milliseconds
    pub fn budget_ms(&self) -> f64 {
        self.tick_budget_ms as f64
    }

    /// Get the busy-reschedule delay as a Duration
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    /// Get the idle-reschedule delay as a Duration
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_budget_ms, 40);
        assert_eq!(config.min_delay_ms, 1);
        assert_eq!(config.idle_delay_ms, 100);
    }

    #[test]
    fn test_delay_durations() {
        let config = SchedulerConfig {
            min_delay_ms: 5,
            idle_delay_ms: 250,
            ..Default::default()
        };
        assert_eq!(config.min_delay(), Duration::from_millis(5));
        assert_eq!(config.idle_delay(), Duration::from_millis(250));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: SchedulerConfig = serde_yaml::from_str("tick_budget_ms: 80").unwrap();
        assert_eq!(config.tick_budget_ms, 80);
        assert_eq!(config.min_delay_ms, 1);
        assert_eq!(config.idle_delay_ms, 100);
    }
}
