// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::constants::{app_info, convergence, flash, frame_sync, history};
use crate::errors::{AaaError, AaaResult};

/// Start-of-frame matching thresholds (microseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameSyncConfig {
    /// Statistics sooner than this after the latest SOF belong to the previous frame
    pub min_delta_us: i64,
    /// Oldest SOF accepted before falling back to the statistics timestamp
    pub max_delta_us: i64,
}

impl Default for FrameSyncConfig {
    fn default() -> Self {
        Self {
            min_delta_us: frame_sync::MIN_SYNC_DELTA_US,
            max_delta_us: frame_sync::MAX_SYNC_DELTA_US,
        }
    }
}

/// When the algorithm's convergence report is trusted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Statistics cycles after invalidation before AE "converged" is believed.
    /// 0 trusts the algorithm from the first cycle.
    pub min_statistics_cycles: u32,
    /// AWB distance below which AWB counts as converged
    pub awb_converged_distance: f32,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            min_statistics_cycles: convergence::MIN_FRAMES_AE_CONVERGED,
            awb_converged_distance: convergence::AWB_CONVERGED_DISTANCE,
        }
    }
}

/// Pre-flash sequence timing, in frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    pub skip_frames: u32,
    pub timeout_frames: u32,
    pub exposed_hold_frames: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            skip_frames: flash::SKIP_FRAMES,
            timeout_frames: flash::FRAME_TIMEOUT,
            exposed_hold_frames: flash::EXPOSED_HOLD_FRAMES,
        }
    }
}

/// 3A session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub frame_sync: FrameSyncConfig,
    pub convergence: ConvergenceConfig,
    pub flash: FlashConfig,
    /// History sizing when the sensor reports an exposure delay of 0
    pub default_exposure_delay_frames: u32,
    /// Statistics events discarded after session start or reconfiguration
    pub drop_initial_statistics: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_sync: FrameSyncConfig::default(),
            convergence: ConvergenceConfig::default(),
            flash: FlashConfig::default(),
            default_exposure_delay_frames: history::DEFAULT_AE_DELAY_FRAMES,
            drop_initial_statistics: 0,
        }
    }
}

impl Config {
    /// `<config dir>/camera3a/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(app_info::CONFIG_DIR_NAME)
                .join(app_info::CONFIG_FILE_NAME)
        })
    }

    /// Read and validate a config file
    pub fn load(path: &Path) -> AaaResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AaaError::Io(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded 3A configuration");
        Ok(config)
    }

    /// Load `path`, or the default path, or fall back to built-in defaults
    /// when no file exists. A file that exists but fails to parse is an error.
    pub fn load_or_default(path: Option<&Path>) -> AaaResult<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => {
                    debug!("No config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> AaaResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> AaaResult<()> {
        if self.frame_sync.min_delta_us < 0 {
            return Err(AaaError::Config(
                "frame_sync.min_delta_us must not be negative".into(),
            ));
        }
        if self.frame_sync.min_delta_us > self.frame_sync.max_delta_us {
            return Err(AaaError::Config(format!(
                "frame_sync.min_delta_us ({}) exceeds max_delta_us ({})",
                self.frame_sync.min_delta_us, self.frame_sync.max_delta_us
            )));
        }
        if self.flash.timeout_frames == 0 {
            return Err(AaaError::Config(
                "flash.timeout_frames must be at least 1".into(),
            ));
        }
        let awb_distance = self.convergence.awb_converged_distance;
        if awb_distance.is_nan() || awb_distance <= 0.0 {
            return Err(AaaError::Config(
                "convergence.awb_converged_distance must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "flash": { "timeout_frames": 8 } }"#).unwrap();
        assert_eq!(config.flash.timeout_frames, 8);
        assert_eq!(config.flash.skip_frames, flash::SKIP_FRAMES);
        assert_eq!(config.frame_sync, FrameSyncConfig::default());
    }

    #[test]
    fn test_inverted_sync_window_rejected() {
        let mut config = Config::default();
        config.frame_sync.min_delta_us = 300_000;
        assert!(matches!(config.validate(), Err(AaaError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.flash.timeout_frames = 0;
        assert!(config.validate().is_err());
    }
}
