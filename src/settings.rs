//! Harness settings
//!
//! Loads defaults for polling, the simulated editor and file locations from
//! a JSON file in the config directory. Command-line flags override them.

use bevy::log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, SCENARIOS_DIR, SIM_SETTLE_STEP, SIM_TICK,
};
use crate::harness::poll::{ConditionPoller, PollSpec};
use crate::sim::SimConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessSettings {
    /// Default `wait_for` timeout in seconds
    pub poll_timeout_secs: f64,
    /// Default `wait_for` interval in seconds
    pub poll_interval_secs: f64,
    /// Simulated editor tick in milliseconds
    pub tick_ms: u64,
    /// Vegetation instances placed per area per tick
    pub settle_step: usize,
    pub scenarios_dir: String,
    /// Record runs here when set
    pub db_path: Option<String>,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs_f64(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs_f64(),
            tick_ms: SIM_TICK.as_millis() as u64,
            settle_step: SIM_SETTLE_STEP,
            scenarios_dir: SCENARIOS_DIR.to_string(),
            db_path: None,
        }
    }
}

impl HarnessSettings {
    /// Load settings from file, or return defaults if it is missing or broken
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No {} found, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn poll_spec(&self) -> PollSpec {
        PollSpec::from_secs_f64(self.poll_timeout_secs, self.poll_interval_secs)
    }

    pub fn poller(&self) -> ConditionPoller {
        let spec = self.poll_spec();
        ConditionPoller::default()
            .with_default_interval(spec.interval)
            .with_default_timeout(spec.timeout)
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            settle_step: self.settle_step,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("harness_settings_{}.json", uuid::Uuid::new_v4()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = HarnessSettings::load(Path::new("no/such/settings.json"));
        assert_eq!(settings, HarnessSettings::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let path = temp_file(r#"{ "tick_ms": 5, "db_path": "runs.db" }"#);
        let settings = HarnessSettings::load(&path);
        fs::remove_file(&path).unwrap();

        assert_eq!(settings.tick_ms, 5);
        assert_eq!(settings.db_path.as_deref(), Some("runs.db"));
        assert_eq!(settings.scenarios_dir, SCENARIOS_DIR);
        assert_eq!(settings.sim_config().tick, Duration::from_millis(5));
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let path = temp_file("{ not json");
        let settings = HarnessSettings::load(&path);
        fs::remove_file(&path).unwrap();
        assert_eq!(settings, HarnessSettings::default());
    }

    #[test]
    fn test_poll_spec_from_seconds() {
        let settings = HarnessSettings {
            poll_timeout_secs: 2.0,
            poll_interval_secs: 0.5,
            ..Default::default()
        };
        let spec = settings.poll_spec();
        assert_eq!(spec.timeout, Duration::from_secs(2));
        assert_eq!(spec.interval, Duration::from_millis(500));
        assert_eq!(settings.poller().default_interval(), Duration::from_millis(500));
        assert_eq!(settings.poller().default_timeout(), Duration::from_secs(2));
    }
}
