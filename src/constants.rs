//! Tunable constants for the harness
//!
//! Defaults for polling, the simulated editor and file locations.

use std::time::Duration;

// =============================================================================
// POLLING
// =============================================================================

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
/// Longest wait a single poll may request
pub const MAX_POLL_TIMEOUT: Duration = Duration::from_secs(3600);

/// Tolerance for comparing floating point property values
pub const DEFAULT_FLOAT_TOLERANCE: f64 = 1e-3;

// =============================================================================
// SIMULATED EDITOR
// =============================================================================

pub const SIM_TICK: Duration = Duration::from_millis(10);
/// Vegetation instances placed per area per tick
pub const SIM_SETTLE_STEP: usize = 4;
/// Default grid spacing for vegetation placement, in meters
pub const DEFAULT_INSTANCE_SPACING: f64 = 4.0;
/// Offset applied by a position modifier when no range is configured
pub const DEFAULT_POSITION_JITTER: f64 = 0.5;
/// Upper bound on placement grid cells per area; spacing coarsens past it
pub const MAX_AREA_CELLS: usize = 4096;
/// How long entity creation waits for its notification
pub const ENTITY_NOTIFY_TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// FILES
// =============================================================================

/// Default path for scenario files
pub const SCENARIOS_DIR: &str = "tests/scenarios";

/// Harness settings file
pub const SETTINGS_FILE: &str = "config/harness_settings.json";

/// Default workspace name when a scenario does not set one
pub const DEFAULT_LEVEL: &str = "tmp_level";
