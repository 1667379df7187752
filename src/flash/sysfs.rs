// SPDX-License-Identifier: GPL-3.0-only

//! Flash LED control via Linux sysfs
//!
//! Discovers flash LEDs exposed at `/sys/class/leds/*:flash` and drives them
//! through the `brightness` file, which is group-writable on most distributions
//! (unlike the root-only `flash_strobe` interface).

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::aiq::collaborators::FlashUnit;
use crate::errors::{AaaError, AaaResult, FlashError};

/// Default LED class directory
pub const LEDS_DIR: &str = "/sys/class/leds";

/// A flash LED discovered via sysfs
#[derive(Debug, Clone)]
pub struct SysfsFlash {
    /// Sysfs path, e.g. `/sys/class/leds/white:flash`
    path: PathBuf,
    /// Value of the `max_brightness` file
    max_brightness: u32,
    /// Directory basename
    name: String,
    /// Intensity programmed by AE, 0-100
    power_percent: f32,
}

impl SysfsFlash {
    /// Scan `/sys/class/leds/` for writable `*:flash` entries
    pub fn discover() -> Vec<SysfsFlash> {
        Self::discover_in(Path::new(LEDS_DIR))
    }

    /// Scan `leds_dir` for usable `*:flash` entries, sorted by name.
    /// Entries that cannot be opened are logged and skipped.
    pub fn discover_in(leds_dir: &Path) -> Vec<SysfsFlash> {
        let entries = match std::fs::read_dir(leds_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %leds_dir.display(), error = %e, "No LED class directory");
                return Vec::new();
            }
        };

        let mut devices: Vec<SysfsFlash> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_flash_led(path))
            .filter_map(|path| {
                Self::open(&path)
                    .inspect_err(|e| warn!(error = %e, "Skipping flash LED"))
                    .ok()
            })
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        devices
    }

    /// Open one LED class device. Fails unless `max_brightness` is a positive
    /// integer and `brightness` can be opened for writing.
    pub fn open(led_path: &Path) -> AaaResult<SysfsFlash> {
        let name = led_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| hardware_error(led_path, "not a valid LED name"))?
            .to_string();

        let raw = std::fs::read_to_string(led_path.join("max_brightness"))
            .map_err(|e| hardware_error(led_path, &format!("max_brightness: {}", e)))?;
        let max_brightness = raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&v| v > 0)
            .ok_or_else(|| {
                hardware_error(led_path, &format!("bad max_brightness {:?}", raw.trim()))
            })?;

        std::fs::OpenOptions::new()
            .write(true)
            .open(led_path.join("brightness"))
            .map_err(|e| hardware_error(led_path, &format!("brightness not writable: {}", e)))?;

        info!(name = %name, max_brightness, "Flash LED ready");
        Ok(SysfsFlash {
            path: led_path.to_path_buf(),
            max_brightness,
            name,
            power_percent: 100.0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    /// Raw brightness for the programmed intensity
    pub fn brightness_for_power(&self) -> u32 {
        let fraction = (self.power_percent / 100.0).clamp(0.0, 1.0);
        (fraction * self.max_brightness as f32).round() as u32
    }

    fn write_brightness(&self, value: u32) -> AaaResult<()> {
        let clamped = value.min(self.max_brightness);
        std::fs::write(self.path.join("brightness"), clamped.to_string())
            .map_err(|e| hardware_error(&self.path, &e.to_string()))
    }
}

/// LED class entries named like `white:flash`
fn is_flash_led(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(":flash"))
}

fn hardware_error(led_path: &Path, detail: &str) -> AaaError {
    AaaError::FlashSequence(FlashError::Hardware(format!(
        "{}: {}",
        led_path.display(),
        detail
    )))
}

impl FlashUnit for SysfsFlash {
    fn set_intensity(&mut self, power_percent: f32) -> AaaResult<()> {
        if !power_percent.is_finite() {
            return Err(AaaError::OutOfRange(format!(
                "flash power {} is not a number",
                power_percent
            )));
        }
        self.power_percent = power_percent.clamp(0.0, 100.0);
        debug!(device = %self.name, power = self.power_percent, "Flash intensity");
        Ok(())
    }

    /// Torch-mode approximation: the LED stays lit until disarmed with 0
    fn fire(&mut self, frames: u32) -> AaaResult<()> {
        let value = if frames == 0 {
            0
        } else {
            self.brightness_for_power()
        };
        debug!(device = %self.name, frames, value, "Flash fire");
        self.write_brightness(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_led(root: &Path, name: &str, max: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("max_brightness"), max).unwrap();
        std::fs::write(dir.join("brightness"), "0").unwrap();
        dir
    }

    #[test]
    fn test_discovers_only_flash_leds() {
        let root = tempfile::tempdir().unwrap();
        fake_led(root.path(), "yellow:flash", "255\n");
        fake_led(root.path(), "white:flash", "100\n");
        fake_led(root.path(), "red:status", "1\n");
        fake_led(root.path(), "broken:flash", "zero\n");

        let devices = SysfsFlash::discover_in(root.path());
        let names: Vec<&str> = devices.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["white:flash", "yellow:flash"]);
    }

    #[test]
    fn test_fire_writes_scaled_brightness() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_led(root.path(), "white:flash", "200");
        let mut flash = SysfsFlash::discover_in(root.path()).remove(0);

        flash.set_intensity(50.0).unwrap();
        flash.fire(1).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "100");

        flash.fire(0).unwrap();
        assert_eq!(std::fs::read_to_string(dir.join("brightness")).unwrap(), "0");
    }

    #[test]
    fn test_open_rejects_zero_max_brightness() {
        let root = tempfile::tempdir().unwrap();
        let dir = fake_led(root.path(), "white:flash", "0");
        let result = SysfsFlash::open(&dir);
        assert!(matches!(
            result,
            Err(AaaError::FlashSequence(FlashError::Hardware(_)))
        ));
    }

    #[test]
    fn test_missing_directory_finds_nothing() {
        let root = tempfile::tempdir().unwrap();
        assert!(SysfsFlash::discover_in(&root.path().join("absent")).is_empty());
    }

    #[test]
    fn test_nan_intensity_rejected() {
        let root = tempfile::tempdir().unwrap();
        fake_led(root.path(), "white:flash", "10");
        let mut flash = SysfsFlash::discover_in(root.path()).remove(0);
        assert!(flash.set_intensity(f32::NAN).is_err());
    }
}
