//! Configuration for the synchronization engine
//!
//! Every tunable the refresh loop reads lives in [`SyncConfig`]: refresh
//! cadence, the hysteresis thresholds of the delay correction, the
//! external-clock regulation bounds, and the maximum credible inter-frame
//! delta. Values load from defaults, then an optional TOML file, then
//! `AVSYNC_*` environment variables.

use crate::utils::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Synchronization engine configuration
///
/// The defaults are bit-compatible with common media-player behavior;
/// most deployments never touch them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Nominal refresh-loop period in seconds
    pub refresh_rate: f64,

    /// Lower bound of the sync hysteresis window in seconds
    pub sync_threshold_min: f64,

    /// Upper bound of the sync hysteresis window in seconds
    pub sync_threshold_max: f64,

    /// Frame duration above which an ahead-of-master frame is lengthened
    /// linearly instead of doubled
    pub frame_dup_threshold: f64,

    /// Clock difference beyond which slaving gives up on correction and
    /// copies the master outright
    pub no_sync_threshold: f64,

    /// Packet-queue occupancy at or below which the external clock slows down
    pub ext_clock_min_frames: usize,

    /// Packet-queue occupancy above which the external clock speeds up
    pub ext_clock_max_frames: usize,

    /// Lower bound for the regulated external-clock speed
    pub ext_speed_min: f64,

    /// Upper bound for the regulated external-clock speed
    pub ext_speed_max: f64,

    /// Per-tick speed adjustment step
    pub ext_speed_step: f64,

    /// Initial upper bound on a credible inter-frame PTS delta in seconds
    ///
    /// 10 s suits seekable media; live sessions raise it via
    /// `SyncEngine::set_max_duration`.
    pub max_frame_duration: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 0.01,
            sync_threshold_min: 0.04,
            sync_threshold_max: 0.1,
            frame_dup_threshold: 0.1,
            no_sync_threshold: 10.0,
            ext_clock_min_frames: 2,
            ext_clock_max_frames: 10,
            ext_speed_min: 0.9,
            ext_speed_max: 1.1,
            ext_speed_step: 0.001,
            max_frame_duration: 10.0,
        }
    }
}

impl SyncConfig {
    /// Load configuration from defaults, an optional TOML file, and
    /// environment overrides
    ///
    /// Later sources override earlier ones:
    /// 1. Default values
    /// 2. The given TOML file, if present
    /// 3. Environment variables (`AVSYNC_*` prefix)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = path {
            if path.exists() {
                config = Self::from_file(path)?;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&contents)
            .map_err(|e| SyncError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Serialize configuration to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        // Example: AVSYNC_REFRESH_RATE=0.005
        if let Ok(rate) = std::env::var("AVSYNC_REFRESH_RATE") {
            self.refresh_rate = rate
                .parse()
                .map_err(|_| SyncError::Config("Invalid AVSYNC_REFRESH_RATE".to_string()))?;
        }

        if let Ok(threshold) = std::env::var("AVSYNC_NO_SYNC_THRESHOLD") {
            self.no_sync_threshold = threshold
                .parse()
                .map_err(|_| SyncError::Config("Invalid AVSYNC_NO_SYNC_THRESHOLD".to_string()))?;
        }

        if let Ok(duration) = std::env::var("AVSYNC_MAX_FRAME_DURATION") {
            self.max_frame_duration = duration
                .parse()
                .map_err(|_| SyncError::Config("Invalid AVSYNC_MAX_FRAME_DURATION".to_string()))?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.refresh_rate <= 0.0 {
            return Err(SyncError::Config(
                "Refresh rate must be positive".to_string(),
            ));
        }

        if self.sync_threshold_min <= 0.0 || self.sync_threshold_min > self.sync_threshold_max {
            return Err(SyncError::Config(format!(
                "Sync thresholds must satisfy 0 < min <= max, got min={} max={}",
                self.sync_threshold_min, self.sync_threshold_max
            )));
        }

        if self.no_sync_threshold <= self.sync_threshold_max {
            return Err(SyncError::Config(
                "No-sync threshold must exceed the sync threshold window".to_string(),
            ));
        }

        if self.ext_clock_min_frames >= self.ext_clock_max_frames {
            return Err(SyncError::Config(format!(
                "External clock occupancy bounds must satisfy min < max, got min={} max={}",
                self.ext_clock_min_frames, self.ext_clock_max_frames
            )));
        }

        if !(self.ext_speed_min < 1.0 && 1.0 < self.ext_speed_max) {
            return Err(SyncError::Config(format!(
                "External speed bounds must bracket 1.0, got min={} max={}",
                self.ext_speed_min, self.ext_speed_max
            )));
        }

        if self.ext_speed_step <= 0.0 {
            return Err(SyncError::Config(
                "External speed step must be positive".to_string(),
            ));
        }

        if self.max_frame_duration <= 0.0 {
            return Err(SyncError::Config(
                "Max frame duration must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
