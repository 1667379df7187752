// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the 3A core
//!
//! Everything here is an owned value type. Results coming out of the algorithm
//! are copied into these structs so nothing aliases algorithm scratch memory.

use serde::{Deserialize, Serialize};

use super::state::{AeState, AfState, AwbState};
use crate::constants::flash::NUM_FLASH_LEDS;
use crate::flash::FlashMode;

/// Sensor-level exposure programming (register codes, not physical units)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SensorExposure {
    /// Coarse integration time in lines
    pub coarse_integration_time: u32,
    /// Fine integration time in pixels
    pub fine_integration_time: u32,
    /// Global analog gain code
    pub analog_gain_code: u32,
    /// Global digital gain code
    pub digital_gain_code: u32,
    /// Frame length in lines (used for fixed frame rate control)
    pub frame_length_lines: u32,
}

/// Per-LED flash decision attached to an exposure result
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FlashParameters {
    /// Flash power in percent of the unit's maximum
    pub power_percent: f32,
    /// The algorithm wants this LED fired for the capture
    pub required: bool,
}

/// One AE algorithm result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureResult {
    pub exposure_time_us: u32,
    pub analog_gain: f32,
    pub digital_gain: f32,
    pub iso: u32,
    pub sensor: SensorExposure,
    /// 0.0 = converged, growing with the distance to the target
    pub distance_from_convergence: f32,
    pub converged: bool,
    pub flashes: [FlashParameters; NUM_FLASH_LEDS],
}

impl ExposureResult {
    /// Whether any LED is required for the capture
    pub fn flash_necessary(&self) -> bool {
        self.flashes.iter().any(|f| f.required)
    }

    /// Power of the first LED (the only one programmed)
    pub fn flash_power(&self) -> f32 {
        self.flashes[0].power_percent
    }
}

/// Frame status flags delivered with a produced frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameStatus {
    #[default]
    Ok,
    /// Buffer content is unusable
    Corrupted,
    /// Frame was fully lit by the flash
    FlashExposed,
    /// Flash fired during part of the frame only
    FlashPartial,
    /// Flash was requested but did not fire
    FlashFailed,
}

/// How the algorithm should treat the frame it runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameUse {
    #[default]
    Preview,
    Still,
    Video,
}

/// Auto exposure on/off
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureMode {
    #[default]
    Auto,
    /// AE disabled, exposure comes from the request
    Manual,
}

/// Autofocus mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfMode {
    Off,
    /// Single sweep on trigger
    Auto,
    Macro,
    ContinuousVideo,
    #[default]
    ContinuousPicture,
    /// Extended depth of field, no lens movement
    Edof,
}

impl AfMode {
    pub fn is_continuous(self) -> bool {
        matches!(self, AfMode::ContinuousVideo | AfMode::ContinuousPicture)
    }

    pub fn is_triggered(self) -> bool {
        matches!(self, AfMode::Auto | AfMode::Macro)
    }
}

/// Auto white balance mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwbMode {
    Off,
    #[default]
    Auto,
    Incandescent,
    Fluorescent,
    Daylight,
    Cloudy,
}

/// Autofocus trigger carried by a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfTrigger {
    #[default]
    Idle,
    Start,
    Cancel,
}

/// AE precapture trigger carried by a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecaptureTrigger {
    #[default]
    Idle,
    Start,
    Cancel,
}

/// Focus status reported by the AF algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AfStatus {
    #[default]
    Idle,
    Busy,
    Success,
    Fail,
}

/// Per-request 3A settings. Absent when unchanged from the previous request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub exposure_mode: ExposureMode,
    pub ae_lock: bool,
    pub af_mode: AfMode,
    pub awb_mode: AwbMode,
    pub awb_lock: bool,
    pub flash_mode: FlashMode,
    /// Exposure compensation in EV
    pub ev_shift: f32,
    /// Exposure used when `exposure_mode` is manual
    pub manual_exposure_time_us: Option<u32>,
    pub manual_iso: Option<u32>,
    pub frame_use: FrameUse,
}

/// Trigger part of a request, applied ahead of per-frame settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTriggers {
    pub precapture: PrecaptureTrigger,
    pub precapture_id: i32,
    pub af: AfTrigger,
    pub af_id: i32,
}

impl CaptureTriggers {
    pub fn is_idle(&self) -> bool {
        self.precapture == PrecaptureTrigger::Idle && self.af == AfTrigger::Idle
    }
}

/// A capture request submitted by the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub request_id: u32,
    pub settings: Option<CaptureSettings>,
    pub triggers: CaptureTriggers,
}

/// Frame-produced notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEvent {
    pub request_id: u32,
    /// Sensor exposure this frame was captured with
    pub exposure_id: u32,
    pub timestamp_us: i64,
    pub status: FrameStatus,
}

/// Statistics-ready notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsEvent {
    pub frame_id: u32,
    /// Arrival time of the statistics (microseconds)
    pub timestamp_us: i64,
}

/// One cell of the RGBS statistics grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbsCell {
    pub r: u8,
    pub gr: u8,
    pub gb: u8,
    pub b: u8,
    /// Saturation percentage of the cell
    pub saturation: u8,
}

/// Face rectangle handed to the algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Face {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub score: u8,
}

/// Statistics read back from the ISP for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStatistics {
    pub grid_width: u32,
    pub grid_height: u32,
    pub rgbs_grid: Vec<RgbsCell>,
    pub af_grid: Vec<u32>,
    pub faces: Vec<Face>,
}

/// Flash state reported with a result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashState {
    /// No flash unit on this camera
    #[default]
    Unavailable,
    Ready,
    Fired,
    Partial,
}

/// Per-request metadata bundle emitted to the capture pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub request_id: u32,
    pub exposure_id: Option<u32>,
    pub ae_state: AeState,
    pub af_state: AfState,
    pub awb_state: AwbState,
    pub ae_trigger_id: i32,
    pub af_trigger_id: i32,
    pub exposure_time_us: Option<u32>,
    pub iso: Option<u32>,
    pub flash_fired: bool,
    pub flash_state: FlashState,
    /// A precapture (pre-flash) sequence is running
    pub ae_precapture_active: bool,
    pub timestamp_us: Option<i64>,
}
