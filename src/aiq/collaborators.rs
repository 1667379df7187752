// SPDX-License-Identifier: GPL-3.0-only

//! Interfaces to everything outside the 3A core
//!
//! The algorithm library, sensor driver, ISP statistics readback and flash LED
//! are reached only through these traits. Results cross the boundary as owned
//! values from [`super::types`].

use serde::{Deserialize, Serialize};

use super::types::{
    AfMode, AfStatus, AwbMode, ExposureMode, ExposureResult, FrameStatistics, FrameUse,
    SensorExposure,
};
use crate::errors::AaaResult;
use crate::flash::FlashMode;

/// Stage of the flash sequence an AE run belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashStage {
    /// Regular 3A run (also the no-flash baseline metering)
    #[default]
    None,
    /// Metering with the pre-flash lit
    Pre,
    /// Final metering for the main flash capture
    Main,
}

/// Inputs for one AE run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AeInput {
    pub frame_use: FrameUse,
    pub exposure_mode: ExposureMode,
    pub flash_mode: FlashMode,
    pub flash_stage: FlashStage,
    /// Exposure compensation in EV
    pub ev_shift: f32,
    pub manual_exposure_time_us: Option<u32>,
    pub manual_iso: Option<u32>,
}

/// Inputs for one AF run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AfInput {
    pub mode: AfMode,
    pub frame_use: FrameUse,
}

/// AF algorithm output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AfResult {
    pub status: AfStatus,
    /// Lens position to move to, when the algorithm wants the lens moved
    pub next_lens_position: Option<i32>,
    pub final_position_reached: bool,
}

/// Inputs for one AWB run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AwbInput {
    pub mode: AwbMode,
    pub frame_use: FrameUse,
}

/// AWB algorithm output
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AwbResult {
    pub accurate_r_per_g: f32,
    pub accurate_b_per_g: f32,
    pub distance_from_convergence: f32,
}

/// The AE/AF/AWB/tone-curve algorithm library
pub trait AiqAlgorithm: Send {
    /// Whether the algorithm handle is initialized
    fn is_ready(&self) -> bool;

    /// Hand statistics to the algorithm.
    ///
    /// `active_exposure` is the exposure the sensor actually had while the
    /// statistics were gathered (`None` before feedback is available).
    fn set_statistics(
        &mut self,
        statistics: &FrameStatistics,
        active_exposure: Option<&ExposureResult>,
        timestamp_us: i64,
    ) -> AaaResult<()>;

    /// Returns `None` when the algorithm produced no exposure this run
    fn run_ae(&mut self, input: &AeInput) -> AaaResult<Option<ExposureResult>>;

    fn run_af(&mut self, input: &AfInput) -> AaaResult<AfResult>;

    fn run_awb(&mut self, input: &AwbInput) -> AaaResult<AwbResult>;

    /// Global brightness/contrast enhancement
    fn run_tone_curve(&mut self, frame_use: FrameUse) -> AaaResult<()>;
}

/// Sensor exposure programming
pub trait SensorControl: Send {
    /// Frames between programming an exposure and seeing it in statistics.
    /// 0 means the driver does not report it.
    fn exposure_delay_frames(&self) -> u32;

    fn apply_exposure(&mut self, exposure: &SensorExposure) -> AaaResult<()>;
}

/// ISP statistics readback
pub trait StatisticsSource: Send {
    fn frame_statistics(&mut self, frame_id: u32) -> AaaResult<FrameStatistics>;
}

/// Flash LED driver
pub trait FlashUnit: Send {
    /// Power in percent of the unit's maximum
    fn set_intensity(&mut self, power_percent: f32) -> AaaResult<()>;

    /// Fire for `frames` frames. 0 disarms the flash.
    fn fire(&mut self, frames: u32) -> AaaResult<()>;
}

/// The set of collaborators owned by one session
pub struct Collaborators {
    pub algorithm: Box<dyn AiqAlgorithm>,
    pub sensor: Box<dyn SensorControl>,
    pub statistics: Box<dyn StatisticsSource>,
    /// `None` on cameras without a flash unit
    pub flash: Option<Box<dyn FlashUnit>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("has_flash", &self.flash.is_some())
            .finish_non_exhaustive()
    }
}
