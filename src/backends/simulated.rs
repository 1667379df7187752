// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic simulated camera
//!
//! A scripted algorithm, sensor, statistics source and flash unit sharing one
//! state. AE ramps linearly from a fixed start exposure to the scene target,
//! AF scans for a fixed number of runs, and a fired flash shows up as a
//! flash-exposed frame status on the next produced frame.
//!
//! Used by the `simulate` command and by tests; every value it produces is
//! reproducible.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace};

use crate::aiq::collaborators::{
    AeInput, AfInput, AfResult, AiqAlgorithm, AwbInput, AwbResult, Collaborators, FlashStage,
    FlashUnit, SensorControl, StatisticsSource,
};
use crate::aiq::types::{
    AfStatus, ExposureMode, ExposureResult, FlashParameters, FrameStatistics, FrameStatus,
    FrameUse, RgbsCell, SensorExposure,
};
use crate::errors::AaaResult;
use crate::flash::FlashMode;

/// Coarse integration time every session starts from
pub const START_COARSE: u32 = 100;
/// Target coarse integration time in a bright scene
pub const BRIGHT_TARGET_COARSE: u32 = 1000;
/// Target coarse integration time in a dark scene
pub const DARK_TARGET_COARSE: u32 = 2000;
/// Exposure time per coarse line (microseconds)
pub const LINE_TIME_US: u32 = 10;

const GRID_WIDTH: u32 = 4;
const GRID_HEIGHT: u32 = 3;

/// Scene script
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedScene {
    /// Low light: longer target exposure, higher ISO and flash wanted
    pub dark: bool,
    /// AE runs until the target is reached (0 = already there)
    pub converge_after: u32,
    /// AF runs reported busy before the scan ends
    pub af_scan_frames: u32,
    /// AF scan ends in failure
    pub af_fails: bool,
    /// AWB runs before the distance drops to 0
    pub awb_converge_after: u32,
    /// Fired flash never shows up in frame status
    pub flash_fails: bool,
    /// Exposure delay reported by the sensor
    pub exposure_delay: u32,
}

impl Default for SimulatedScene {
    fn default() -> Self {
        Self {
            dark: false,
            converge_after: 4,
            af_scan_frames: 3,
            af_fails: false,
            awb_converge_after: 2,
            flash_fails: false,
            exposure_delay: 2,
        }
    }
}

impl SimulatedScene {
    fn target_coarse(&self) -> u32 {
        if self.dark {
            DARK_TARGET_COARSE
        } else {
            BRIGHT_TARGET_COARSE
        }
    }

    fn iso(&self) -> u32 {
        if self.dark { 800 } else { 100 }
    }
}

#[derive(Debug)]
struct RigState {
    algorithm_ready: bool,
    applied: Vec<SensorExposure>,
    flash_fires: Vec<u32>,
    flash_intensities: Vec<f32>,
    /// Frames still to be reported as flash-exposed
    exposed_pending: u32,
    statistics_read: u32,
}

/// Owner of the shared simulated state; hands out collaborators and lets
/// tests inspect what the 3A core did to the hardware.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    scene: SimulatedScene,
    state: Arc<Mutex<RigState>>,
}

impl SimulatedRig {
    pub fn new(scene: SimulatedScene) -> Self {
        Self {
            scene,
            state: Arc::new(Mutex::new(RigState {
                algorithm_ready: true,
                applied: Vec::new(),
                flash_fires: Vec::new(),
                flash_intensities: Vec::new(),
                exposed_pending: 0,
                statistics_read: 0,
            })),
        }
    }

    pub fn scene(&self) -> &SimulatedScene {
        &self.scene
    }

    /// Fresh collaborators with a flash unit
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            flash: Some(Box::new(SimulatedFlash {
                state: Arc::clone(&self.state),
                fails: self.scene.flash_fails,
            })),
            ..self.collaborators_without_flash()
        }
    }

    /// Fresh collaborators for a camera without flash
    pub fn collaborators_without_flash(&self) -> Collaborators {
        Collaborators {
            algorithm: Box::new(SimulatedAlgorithm::new(
                self.scene.clone(),
                Arc::clone(&self.state),
            )),
            sensor: Box::new(SimulatedSensor {
                delay: self.scene.exposure_delay,
                state: Arc::clone(&self.state),
            }),
            statistics: Box::new(SimulatedStatistics {
                state: Arc::clone(&self.state),
            }),
            flash: None,
        }
    }

    pub fn set_algorithm_ready(&self, ready: bool) {
        self.lock().algorithm_ready = ready;
    }

    /// Every sensor exposure programmed so far, oldest first
    pub fn applied_exposures(&self) -> Vec<SensorExposure> {
        self.lock().applied.clone()
    }

    /// Pulse counts passed to `fire`, 0 for disarm
    pub fn flash_fires(&self) -> Vec<u32> {
        self.lock().flash_fires.clone()
    }

    pub fn flash_intensities(&self) -> Vec<f32> {
        self.lock().flash_intensities.clone()
    }

    pub fn statistics_read(&self) -> u32 {
        self.lock().statistics_read
    }

    /// Status flags for the next produced frame
    pub fn next_frame_status(&self) -> FrameStatus {
        let mut state = self.lock();
        if state.exposed_pending > 0 {
            state.exposed_pending -= 1;
            FrameStatus::FlashExposed
        } else {
            FrameStatus::Ok
        }
    }

    fn lock(&self) -> MutexGuard<'_, RigState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn lock(state: &Mutex<RigState>) -> MutexGuard<'_, RigState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

struct SimulatedAlgorithm {
    scene: SimulatedScene,
    state: Arc<Mutex<RigState>>,
    ae_runs: u32,
    af_runs: u32,
    awb_runs: u32,
}

impl SimulatedAlgorithm {
    fn new(scene: SimulatedScene, state: Arc<Mutex<RigState>>) -> Self {
        Self {
            scene,
            state,
            ae_runs: 0,
            af_runs: 0,
            awb_runs: 0,
        }
    }

    fn exposure(&self, coarse: u32, target: u32, input: &AeInput) -> ExposureResult {
        let wants_flash = self.scene.dark && input.flash_mode != FlashMode::Off;
        let distance = (target as f32 - coarse as f32).abs() / target.max(1) as f32;
        let iso = input.manual_iso.unwrap_or(self.scene.iso());
        ExposureResult {
            exposure_time_us: coarse * LINE_TIME_US,
            analog_gain: iso as f32 / 100.0,
            digital_gain: 1.0,
            iso,
            sensor: SensorExposure {
                coarse_integration_time: coarse,
                fine_integration_time: 0,
                analog_gain_code: iso / 100 * 16,
                digital_gain_code: 256,
                frame_length_lines: coarse.max(START_COARSE) + 16,
            },
            distance_from_convergence: distance,
            converged: coarse == target,
            flashes: [FlashParameters {
                power_percent: if wants_flash { 100.0 } else { 0.0 },
                required: wants_flash,
            }],
        }
    }
}

impl AiqAlgorithm for SimulatedAlgorithm {
    fn is_ready(&self) -> bool {
        lock(&self.state).algorithm_ready
    }

    fn set_statistics(
        &mut self,
        statistics: &FrameStatistics,
        active_exposure: Option<&ExposureResult>,
        timestamp_us: i64,
    ) -> AaaResult<()> {
        trace!(
            cells = statistics.rgbs_grid.len(),
            feedback_coarse = active_exposure.map(|e| e.sensor.coarse_integration_time),
            timestamp_us,
            "Simulated statistics"
        );
        Ok(())
    }

    fn run_ae(&mut self, input: &AeInput) -> AaaResult<Option<ExposureResult>> {
        let base = self.scene.target_coarse() as f32 * 2f32.powf(input.ev_shift);
        let target = base.round().max(1.0) as u32;

        if input.exposure_mode == ExposureMode::Manual {
            let coarse = input
                .manual_exposure_time_us
                .map_or(target, |t| (t / LINE_TIME_US).max(1));
            return Ok(Some(self.exposure(coarse, coarse, input)));
        }

        let result = match input.flash_stage {
            FlashStage::Pre => self.exposure(target / 4, target / 4, input),
            FlashStage::Main => self.exposure(target / 2, target / 2, input),
            FlashStage::None => {
                self.ae_runs += 1;
                let coarse = ramp(START_COARSE, target, self.ae_runs, self.scene.converge_after);
                self.exposure(coarse, target, input)
            }
        };
        debug!(
            coarse = result.sensor.coarse_integration_time,
            stage = ?input.flash_stage,
            converged = result.converged,
            "Simulated AE"
        );
        Ok(Some(result))
    }

    fn run_af(&mut self, _input: &AfInput) -> AaaResult<AfResult> {
        self.af_runs += 1;
        let status = if self.af_runs <= self.scene.af_scan_frames {
            AfStatus::Busy
        } else if self.scene.af_fails {
            AfStatus::Fail
        } else {
            AfStatus::Success
        };
        Ok(AfResult {
            status,
            next_lens_position: (status == AfStatus::Busy).then_some(self.af_runs as i32 * 10),
            final_position_reached: status != AfStatus::Busy,
        })
    }

    fn run_awb(&mut self, _input: &AwbInput) -> AaaResult<AwbResult> {
        self.awb_runs += 1;
        let distance = if self.awb_runs >= self.scene.awb_converge_after {
            0.0
        } else {
            0.1
        };
        Ok(AwbResult {
            accurate_r_per_g: 1.0,
            accurate_b_per_g: 1.0,
            distance_from_convergence: distance,
        })
    }

    fn run_tone_curve(&mut self, _frame_use: FrameUse) -> AaaResult<()> {
        Ok(())
    }
}

/// Linear ramp from `start` reaching `target` after `steps` runs
fn ramp(start: u32, target: u32, run: u32, steps: u32) -> u32 {
    if run >= steps {
        return target;
    }
    let span = target as i64 - start as i64;
    (start as i64 + span * run as i64 / steps as i64) as u32
}

struct SimulatedSensor {
    delay: u32,
    state: Arc<Mutex<RigState>>,
}

impl SensorControl for SimulatedSensor {
    fn exposure_delay_frames(&self) -> u32 {
        self.delay
    }

    fn apply_exposure(&mut self, exposure: &SensorExposure) -> AaaResult<()> {
        lock(&self.state).applied.push(*exposure);
        Ok(())
    }
}

struct SimulatedStatistics {
    state: Arc<Mutex<RigState>>,
}

impl StatisticsSource for SimulatedStatistics {
    fn frame_statistics(&mut self, frame_id: u32) -> AaaResult<FrameStatistics> {
        let mut state = lock(&self.state);
        state.statistics_read += 1;
        let level = state
            .applied
            .last()
            .map_or(0, |e| (e.coarse_integration_time / 8).min(255)) as u8;
        let cell = RgbsCell {
            r: level,
            gr: level,
            gb: level,
            b: level,
            saturation: 0,
        };
        trace!(frame_id, level, "Simulated statistics readback");
        Ok(FrameStatistics {
            grid_width: GRID_WIDTH,
            grid_height: GRID_HEIGHT,
            rgbs_grid: vec![cell; (GRID_WIDTH * GRID_HEIGHT) as usize],
            af_grid: vec![level as u32; (GRID_WIDTH * GRID_HEIGHT) as usize],
            faces: Vec::new(),
        })
    }
}

struct SimulatedFlash {
    state: Arc<Mutex<RigState>>,
    fails: bool,
}

impl FlashUnit for SimulatedFlash {
    fn set_intensity(&mut self, power_percent: f32) -> AaaResult<()> {
        lock(&self.state).flash_intensities.push(power_percent);
        Ok(())
    }

    fn fire(&mut self, frames: u32) -> AaaResult<()> {
        let mut state = lock(&self.state);
        state.flash_fires.push(frames);
        state.exposed_pending = if self.fails { 0 } else { frames };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_reaches_target() {
        assert_eq!(ramp(100, 1000, 0, 4), 100);
        assert_eq!(ramp(100, 1000, 2, 4), 550);
        assert_eq!(ramp(100, 1000, 4, 4), 1000);
        assert_eq!(ramp(100, 1000, 9, 0), 1000);
    }

    #[test]
    fn test_fired_flash_exposes_next_frame() {
        let rig = SimulatedRig::new(SimulatedScene::default());
        let mut collaborators = rig.collaborators();
        let flash = collaborators.flash.as_mut().unwrap();
        flash.fire(1).unwrap();
        assert_eq!(rig.next_frame_status(), FrameStatus::FlashExposed);
        assert_eq!(rig.next_frame_status(), FrameStatus::Ok);
        assert_eq!(rig.flash_fires(), vec![1]);
    }

    #[test]
    fn test_failing_flash_never_exposes() {
        let rig = SimulatedRig::new(SimulatedScene {
            flash_fails: true,
            ..Default::default()
        });
        let mut collaborators = rig.collaborators();
        collaborators.flash.as_mut().unwrap().fire(1).unwrap();
        assert_eq!(rig.next_frame_status(), FrameStatus::Ok);
    }

    #[test]
    fn test_dark_scene_wants_flash_unless_off() {
        let rig = SimulatedRig::new(SimulatedScene {
            dark: true,
            ..Default::default()
        });
        let mut collaborators = rig.collaborators();
        let input = AeInput {
            flash_mode: FlashMode::Auto,
            ..Default::default()
        };
        let result = collaborators.algorithm.run_ae(&input).unwrap().unwrap();
        assert!(result.flash_necessary());

        let input = AeInput::default();
        let result = collaborators.algorithm.run_ae(&input).unwrap().unwrap();
        assert!(!result.flash_necessary());
    }
}
