// SPDX-License-Identifier: GPL-3.0-only

//! Per-statistics algorithm run
//!
//! One [`AlgorithmRunner::run`] per statistics event: resolve the frame the
//! statistics belong to, feed them to the algorithm together with the exposure
//! that was active on the sensor, run AF, AE, AWB and the tone curve, and
//! program the sensor only when the result actually changed.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::collaborators::{AeInput, AfInput, AwbInput, Collaborators, FlashStage};
use super::frame_sync::{FrameSyncTracker, SyncResolution};
use super::history::ExposureHistory;
use super::types::{
    AfMode, AfStatus, AwbMode, ExposureMode, ExposureResult, FrameUse, SensorExposure,
    StatisticsEvent,
};
use crate::config::{Config, ConvergenceConfig, FrameSyncConfig};
use crate::errors::{AaaError, AaaResult};
use crate::flash::FlashMode;

/// Decides when the algorithm's own convergence report is believed.
///
/// The AE algorithm reports a false "converged" on the first frames after
/// stream start, so its flag is ignored until enough statistics cycles have
/// run since the last invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergencePolicy {
    pub min_statistics_cycles: u32,
}

impl ConvergencePolicy {
    /// Trust the algorithm from the first cycle
    pub const TRUST_ALWAYS: Self = Self {
        min_statistics_cycles: 0,
    };

    pub fn trusts(&self, statistics_cycles: u32) -> bool {
        statistics_cycles >= self.min_statistics_cycles
    }
}

impl From<&ConvergenceConfig> for ConvergencePolicy {
    fn from(config: &ConvergenceConfig) -> Self {
        Self {
            min_statistics_cycles: config.min_statistics_cycles,
        }
    }
}

/// Metering passes run by the flash sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeteringStage {
    /// Ambient-light pass before the pre-flash
    Baseline,
    /// Pass on the frame lit by the pre-flash
    PreFlash,
    /// Pass computing the main-flash capture exposure
    MainFlash,
}

impl MeteringStage {
    fn flash_stage(self) -> FlashStage {
        match self {
            MeteringStage::Baseline => FlashStage::None,
            MeteringStage::PreFlash => FlashStage::Pre,
            MeteringStage::MainFlash => FlashStage::Main,
        }
    }
}

/// 3A controls derived from the capture requests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunnerControls {
    pub exposure_mode: ExposureMode,
    pub ae_lock: bool,
    pub af_mode: AfMode,
    pub af_lock: bool,
    pub awb_mode: AwbMode,
    pub awb_lock: bool,
    /// Effective flash mode (already forced off in low-power mode)
    pub flash_mode: FlashMode,
    pub ev_shift: f32,
    pub manual_exposure_time_us: Option<u32>,
    pub manual_iso: Option<u32>,
    pub frame_use: FrameUse,
}

/// What one run did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    pub sync: SyncResolution,
    /// AE produced a new result
    pub ae_updated: bool,
    /// New sensor exposure was programmed
    pub exposure_applied: bool,
    /// New flash intensity was programmed
    pub flash_intensity_applied: bool,
}

/// Runs the algorithm and owns the exposure feedback history
#[derive(Debug)]
pub struct AlgorithmRunner {
    history: ExposureHistory,
    frame_sync: Arc<FrameSyncTracker>,
    sync_config: FrameSyncConfig,
    policy: ConvergencePolicy,
    awb_converged_distance: f32,
    default_delay: u32,
    /// Sensor exposure delay (default substituted for 0)
    sensor_delay: u32,
    /// History offset used for feedback; 0 during still metering
    feedback_delay: usize,
    controls: RunnerControls,
    flash_stage: FlashStage,
    invalidated: bool,
    statistics_cycles: u32,
    ae_converged: bool,
    awb_converged: bool,
    af_status: AfStatus,
    flash_necessary: bool,
    /// Exposure of the last preview (non-flash) run, restored after the pre-flash
    last_preview_exposure: Option<SensorExposure>,
}

impl AlgorithmRunner {
    pub fn new(
        frame_sync: Arc<FrameSyncTracker>,
        sensor_delay_frames: u32,
        config: &Config,
    ) -> Self {
        let default_delay = config.default_exposure_delay_frames;
        let sensor_delay = effective_delay(sensor_delay_frames, default_delay);
        Self {
            history: ExposureHistory::for_exposure_delay(sensor_delay, default_delay),
            frame_sync,
            sync_config: config.frame_sync,
            policy: ConvergencePolicy::from(&config.convergence),
            awb_converged_distance: config.convergence.awb_converged_distance,
            default_delay,
            sensor_delay,
            feedback_delay: sensor_delay as usize,
            controls: RunnerControls::default(),
            flash_stage: FlashStage::None,
            invalidated: true,
            statistics_cycles: 0,
            ae_converged: false,
            awb_converged: false,
            af_status: AfStatus::Idle,
            flash_necessary: false,
            last_preview_exposure: None,
        }
    }

    /// Replace the convergence policy
    pub fn set_convergence_policy(&mut self, policy: ConvergencePolicy) {
        self.policy = policy;
    }

    pub fn convergence_policy(&self) -> ConvergencePolicy {
        self.policy
    }

    /// Sensor mode change: rebuild the history for the new delay and
    /// apply the next result unconditionally.
    pub fn reconfigure(&mut self, sensor_delay_frames: u32) {
        self.sensor_delay = effective_delay(sensor_delay_frames, self.default_delay);
        self.history = ExposureHistory::for_exposure_delay(self.sensor_delay, self.default_delay);
        self.feedback_delay = self.sensor_delay as usize;
        self.invalidate();
        info!(
            sensor_delay = self.sensor_delay,
            depth = self.history.depth(),
            "AE history reconfigured"
        );
    }

    /// Next AE result is applied unconditionally and convergence is re-earned
    pub fn invalidate(&mut self) {
        self.invalidated = true;
        self.statistics_cycles = 0;
        self.ae_converged = false;
        self.awb_converged = false;
    }

    pub fn controls(&self) -> &RunnerControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut RunnerControls {
        &mut self.controls
    }

    pub fn history(&self) -> &ExposureHistory {
        &self.history
    }

    pub fn sensor_delay(&self) -> u32 {
        self.sensor_delay
    }

    pub fn ae_converged(&self) -> bool {
        self.ae_converged
    }

    pub fn awb_converged(&self) -> bool {
        self.awb_converged
    }

    pub fn af_status(&self) -> AfStatus {
        self.af_status
    }

    /// Whether the latest AE result asks for flash
    pub fn flash_necessary(&self) -> bool {
        self.flash_necessary
    }

    /// Exposure active on the sensor: the result programmed `sensor_delay`
    /// runs ago, or the newest one while the history is still filling.
    pub fn active_exposure(&self) -> Option<&ExposureResult> {
        self.history
            .peek(self.sensor_delay as usize)
            .or_else(|| self.history.peek(0))
    }

    /// Regular 3A run for a statistics event
    pub fn run(
        &mut self,
        collaborators: &mut Collaborators,
        event: &StatisticsEvent,
    ) -> AaaResult<RunOutcome> {
        if !collaborators.algorithm.is_ready() {
            return Err(AaaError::NotReady("algorithm handle not initialized".into()));
        }
        let sync = self.frame_sync.resolve(event.timestamp_us, &self.sync_config);
        self.process(collaborators, event.frame_id, sync)
    }

    /// Flash-sequence metering pass.
    ///
    /// Feedback delay is 0 since the sequence skips frames itself. Pre- and
    /// main-flash passes lock AF, unlock AE and AWB and run as still frames;
    /// locks and frame use are restored afterwards.
    pub fn run_metering(
        &mut self,
        collaborators: &mut Collaborators,
        event: &StatisticsEvent,
        stage: MeteringStage,
    ) -> AaaResult<RunOutcome> {
        if !collaborators.algorithm.is_ready() {
            return Err(AaaError::NotReady("algorithm handle not initialized".into()));
        }
        let sync = self.frame_sync.resolve(event.timestamp_us, &self.sync_config);

        self.feedback_delay = 0;
        self.flash_stage = stage.flash_stage();
        debug!(?stage, frame_id = event.frame_id, "Metering pass");

        let result = if stage == MeteringStage::Baseline {
            self.process(collaborators, event.frame_id, sync)
        } else {
            let saved = (self.controls.af_lock, self.controls.ae_lock, self.controls.awb_lock);
            let saved_use = self.controls.frame_use;
            self.controls.af_lock = true;
            self.controls.ae_lock = false;
            self.controls.awb_lock = false;
            self.controls.frame_use = FrameUse::Still;

            let result = self.process(collaborators, event.frame_id, sync);

            self.controls.frame_use = saved_use;
            (self.controls.af_lock, self.controls.ae_lock, self.controls.awb_lock) = saved;
            result
        };

        self.flash_stage = FlashStage::None;
        self.feedback_delay = if self.controls.frame_use == FrameUse::Still {
            0
        } else {
            self.sensor_delay as usize
        };
        result
    }

    fn process(
        &mut self,
        collaborators: &mut Collaborators,
        frame_id: u32,
        sync: SyncResolution,
    ) -> AaaResult<RunOutcome> {
        let statistics = collaborators.statistics.frame_statistics(frame_id)?;

        let feedback = self.history.peek(self.feedback_delay);
        if feedback.is_none() && !self.history.is_empty() {
            debug!(
                offset = self.feedback_delay,
                available = self.history.len(),
                "No delayed exposure feedback yet"
            );
        }
        collaborators
            .algorithm
            .set_statistics(&statistics, feedback, sync.timestamp_us())?;
        self.statistics_cycles = self.statistics_cycles.saturating_add(1);

        self.run_af(collaborators)?;
        let (ae_updated, exposure_applied, flash_intensity_applied) = self.run_ae(collaborators)?;
        self.run_awb(collaborators)?;
        if self.controls.exposure_mode != ExposureMode::Manual {
            collaborators
                .algorithm
                .run_tone_curve(self.controls.frame_use)?;
        }

        Ok(RunOutcome {
            sync,
            ae_updated,
            exposure_applied,
            flash_intensity_applied,
        })
    }

    fn run_af(&mut self, collaborators: &mut Collaborators) -> AaaResult<()> {
        if self.controls.af_lock || matches!(self.controls.af_mode, AfMode::Off | AfMode::Edof) {
            return Ok(());
        }
        let input = AfInput {
            mode: self.controls.af_mode,
            frame_use: self.controls.frame_use,
        };
        let result = collaborators.algorithm.run_af(&input)?;
        if result.status != self.af_status {
            debug!(from = ?self.af_status, to = ?result.status, "AF status changed");
        }
        self.af_status = result.status;
        Ok(())
    }

    /// Returns (result stored, exposure programmed, flash intensity programmed)
    fn run_ae(&mut self, collaborators: &mut Collaborators) -> AaaResult<(bool, bool, bool)> {
        let invalidated = self.invalidated || self.history.is_empty();
        if !invalidated && self.controls.ae_lock {
            return Ok((false, false, false));
        }

        let input = AeInput {
            frame_use: self.controls.frame_use,
            exposure_mode: self.controls.exposure_mode,
            flash_mode: self.controls.flash_mode,
            flash_stage: self.flash_stage,
            ev_shift: self.controls.ev_shift,
            manual_exposure_time_us: self.controls.manual_exposure_time_us,
            manual_iso: self.controls.manual_iso,
        };
        let Some(new) = collaborators.algorithm.run_ae(&input)? else {
            debug!("AE produced no new results");
            return Ok((false, false, false));
        };

        let still = self.controls.frame_use == FrameUse::Still;
        if !still && self.flash_stage == FlashStage::None {
            self.last_preview_exposure = Some(new.sensor);
        }

        if self.policy.trusts(self.statistics_cycles) {
            self.ae_converged = new.converged;
        }
        self.flash_necessary = new.flash_necessary();

        let (apply_exposure, apply_flash) = match self.history.peek(0) {
            Some(prev) if !invalidated => (
                sensor_exposure_changed(&prev.sensor, &new.sensor),
                prev.flash_power() != new.flash_power(),
            ),
            _ => (true, true),
        };

        if invalidated {
            self.history.fill(&new);
        } else if still {
            // Still runs keep the preview history for restoring later
            self.history.update_head(&new);
        } else {
            self.history.push(&new);
        }
        self.invalidated = false;

        if apply_exposure {
            let exposure = match (still, self.flash_stage, self.last_preview_exposure) {
                (true, FlashStage::Main, Some(preview)) => preview,
                _ => new.sensor,
            };
            if let Err(e) = collaborators.sensor.apply_exposure(&exposure) {
                error!(error = %e, "Failed to program sensor exposure");
                return Err(e);
            }
            debug!(
                coarse = exposure.coarse_integration_time,
                analog_gain_code = exposure.analog_gain_code,
                converged = new.converged,
                "Applied sensor exposure"
            );
        }

        let mut flash_applied = false;
        if apply_flash {
            if let Some(flash) = collaborators.flash.as_mut() {
                flash.set_intensity(new.flash_power())?;
                flash_applied = true;
            }
        }

        Ok((true, apply_exposure, flash_applied))
    }

    fn run_awb(&mut self, collaborators: &mut Collaborators) -> AaaResult<()> {
        if self.controls.awb_lock || self.controls.awb_mode == AwbMode::Off {
            return Ok(());
        }
        let input = AwbInput {
            mode: self.controls.awb_mode,
            frame_use: self.controls.frame_use,
        };
        let result = collaborators.algorithm.run_awb(&input)?;
        self.awb_converged = result.distance_from_convergence < self.awb_converged_distance;
        if result.distance_from_convergence.is_nan() {
            warn!("AWB reported NaN distance from convergence");
        }
        Ok(())
    }
}

fn effective_delay(reported: u32, default_delay: u32) -> u32 {
    if reported == 0 { default_delay } else { reported }
}

/// Field-by-field comparison of the programmed registers
fn sensor_exposure_changed(prev: &SensorExposure, new: &SensorExposure) -> bool {
    prev.coarse_integration_time != new.coarse_integration_time
        || prev.fine_integration_time != new.fine_integration_time
        || prev.analog_gain_code != new.analog_gain_code
        || prev.digital_gain_code != new.digital_gain_code
}
