// SPDX-License-Identifier: GPL-3.0-only

//! Flash control
//!
//! [`sequencer`] drives the pre-flash metering sequence; [`sysfs`] is a
//! [`crate::aiq::collaborators::FlashUnit`] backed by Linux LED class devices,
//! and [`bank`] drives several units as one.

pub mod bank;
pub mod sequencer;
pub mod sysfs;

use serde::{Deserialize, Serialize};

pub use bank::FlashBank;
pub use sequencer::{FlashAction, FlashSequenceState, FlashSequencer};

/// Flash operating mode requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlashMode {
    /// Flash never fires
    #[default]
    Off,
    /// Fires when the AE algorithm asks for it
    Auto,
    /// Fires for every still capture
    On,
    /// Fires for the next still capture only
    Single,
    /// LED stays on continuously
    Torch,
}

impl FlashMode {
    /// Whether the algorithm's flash decision is consulted in this mode
    pub fn is_auto(self) -> bool {
        self == FlashMode::Auto
    }

    /// Whether this mode fires without asking the algorithm
    pub fn is_forced(self) -> bool {
        matches!(self, FlashMode::On | FlashMode::Single)
    }
}

/// Decide whether the capture needs flash.
///
/// `ae_locked_flash` is the decision captured when AE was locked; it replaces
/// the live algorithm decision while AE stays locked.
pub fn flash_necessary(
    mode: FlashMode,
    algorithm_wants_flash: bool,
    ae_locked_flash: Option<bool>,
) -> bool {
    if mode.is_forced() {
        return true;
    }
    if !mode.is_auto() {
        return false;
    }
    ae_locked_flash.unwrap_or(algorithm_wants_flash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forced_modes_always_fire() {
        assert!(flash_necessary(FlashMode::On, false, None));
        assert!(flash_necessary(FlashMode::Single, false, Some(false)));
    }

    #[test]
    fn test_off_and_torch_never_fire() {
        assert!(!flash_necessary(FlashMode::Off, true, None));
        assert!(!flash_necessary(FlashMode::Torch, true, Some(true)));
    }

    #[test]
    fn test_auto_uses_lock_time_decision() {
        assert!(flash_necessary(FlashMode::Auto, true, None));
        assert!(!flash_necessary(FlashMode::Auto, true, Some(false)));
        assert!(flash_necessary(FlashMode::Auto, false, Some(true)));
    }
}
