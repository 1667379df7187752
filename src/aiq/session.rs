// SPDX-License-Identifier: GPL-3.0-only

//! 3A session context
//!
//! [`Session`] owns every piece of 3A state for one camera: the algorithm
//! runner and its exposure history, the three state machines, the flash
//! sequencer and the pending request queue. It is driven one event at a time
//! by the worker and never shared.
//!
//! Event ordering:
//! - a request applies its triggers at once and its settings when its frame
//!   is produced (or at once, when nothing older is pending)
//! - a produced frame is queued for evaluation
//! - a statistics event runs the algorithm, then evaluates every queued frame
//!   it covers: AF, AE and AWB state machines, then one flash sequencer step
//! - metadata is released oldest request first

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::collaborators::Collaborators;
use super::frame_sync::FrameSyncTracker;
use super::requests::RequestQueue;
use super::runner::{AlgorithmRunner, MeteringStage};
use super::state::{AeInputs, AeStateMachine, AfInputs, AfStateMachine, AwbInputs, AwbStateMachine};
use super::types::{
    AfTrigger, AwbMode, CaptureRequest, CaptureSettings, CaptureTriggers, ExposureMode,
    FlashState, FrameEvent, FrameStatus, PrecaptureTrigger, ResultMetadata, StatisticsEvent,
};
use crate::config::Config;
use crate::constants::flash::PRE_FLASH_PULSES;
use crate::errors::{AaaError, AaaResult};
use crate::flash::{self, FlashAction, FlashMode, FlashSequencer};

/// Events consumed by a session, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Request(CaptureRequest),
    FrameProduced(FrameEvent),
    StatisticsReady(StatisticsEvent),
    /// The pipeline needs this request's metadata now
    MetadataRequestable(u32),
    /// Still capture done, leave the flash sequence
    ExitFlashSequence,
    /// Sensor mode changed
    Reconfigure { exposure_delay_frames: u32 },
    LowPowerMode(bool),
}

pub struct Session {
    config: Config,
    collaborators: Collaborators,
    runner: AlgorithmRunner,
    ae: AeStateMachine,
    af: AfStateMachine,
    awb: AwbStateMachine,
    sequencer: FlashSequencer,
    requests: RequestQueue,
    /// Produced frames waiting for their statistics
    unevaluated: VecDeque<FrameEvent>,
    /// Newest statistics frame handled
    last_statistics_frame: Option<u32>,
    settings: CaptureSettings,
    /// Triggers applied but not yet consumed by an evaluation
    pending_triggers: CaptureTriggers,
    low_power: bool,
    drop_remaining: u32,
    /// Frames still reported as flash-exposed after an exposed frame
    exposed_hold: u32,
    outbox: Vec<ResultMetadata>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("pending_requests", &self.requests.len())
            .field("unevaluated_frames", &self.unevaluated.len())
            .field("ae", &self.ae.state())
            .field("af", &self.af.state())
            .field("awb", &self.awb.state())
            .field("flash", &self.sequencer.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        config: Config,
        collaborators: Collaborators,
        frame_sync: Arc<FrameSyncTracker>,
    ) -> Self {
        let delay = collaborators.sensor.exposure_delay_frames();
        let runner = AlgorithmRunner::new(frame_sync, delay, &config);
        info!(
            sensor_delay = runner.sensor_delay(),
            history_depth = runner.history().depth(),
            has_flash = collaborators.flash.is_some(),
            "3A session started"
        );

        let mut session = Self {
            sequencer: FlashSequencer::new(config.flash),
            drop_remaining: config.drop_initial_statistics,
            config,
            collaborators,
            runner,
            ae: AeStateMachine::new(),
            af: AfStateMachine::new(),
            awb: AwbStateMachine::new(),
            requests: RequestQueue::new(),
            unevaluated: VecDeque::new(),
            last_statistics_frame: None,
            settings: CaptureSettings::default(),
            pending_triggers: CaptureTriggers::default(),
            low_power: false,
            exposed_hold: 0,
            outbox: Vec::new(),
        };
        let defaults = session.settings.clone();
        session.apply_settings(&defaults);
        session
    }

    /// Dispatch one event. Results become available through [`Self::take_results`]
    /// even when an error is returned.
    pub fn handle(&mut self, event: SessionEvent) -> AaaResult<()> {
        let status = match event {
            SessionEvent::Request(request) => self.on_new_request(request),
            SessionEvent::FrameProduced(frame) => self.on_frame_produced(frame),
            SessionEvent::StatisticsReady(stats) => self.on_statistics_ready(stats),
            SessionEvent::MetadataRequestable(request_id) => {
                self.on_metadata_requestable(request_id)
            }
            SessionEvent::ExitFlashSequence => {
                self.exit_flash_sequence();
                Ok(())
            }
            SessionEvent::Reconfigure {
                exposure_delay_frames,
            } => {
                self.reconfigure(exposure_delay_frames);
                Ok(())
            }
            SessionEvent::LowPowerMode(enabled) => {
                self.low_power = enabled;
                Ok(())
            }
        };
        self.outbox.extend(self.requests.drain_ready());
        status
    }

    /// Metadata released so far, oldest request first
    pub fn take_results(&mut self) -> Vec<ResultMetadata> {
        std::mem::take(&mut self.outbox)
    }

    pub fn on_new_request(&mut self, request: CaptureRequest) -> AaaResult<()> {
        let triggers = request.triggers;
        let settings = request.settings.clone();
        let apply_now = self.requests.push(request);

        if !triggers.is_idle() {
            self.apply_triggers(&triggers);
        }
        if apply_now {
            if let Some(settings) = settings {
                self.apply_settings(&settings);
            }
        }
        Ok(())
    }

    pub fn on_frame_produced(&mut self, frame: FrameEvent) -> AaaResult<()> {
        if let Some(settings) = self.requests.frame_produced(frame.request_id, frame.exposure_id)? {
            self.apply_settings(&settings);
        }

        let covered = self
            .last_statistics_frame
            .is_some_and(|last| frame.exposure_id <= last);
        if covered {
            debug!(
                request_id = frame.request_id,
                exposure_id = frame.exposure_id,
                "Frame after its statistics, evaluating now"
            );
            self.evaluate_frame(&frame, None)
        } else {
            self.unevaluated.push_back(frame);
            Ok(())
        }
    }

    pub fn on_statistics_ready(&mut self, stats: StatisticsEvent) -> AaaResult<()> {
        let flash_mode = self.effective_flash_mode();
        self.runner.controls_mut().flash_mode = flash_mode;

        let run_status = if self.sequencer.is_active() {
            debug!(frame_id = stats.frame_id, "Flash sequence active, 3A run skipped");
            Ok(())
        } else if self.drop_remaining > 0 {
            self.drop_remaining -= 1;
            debug!(
                frame_id = stats.frame_id,
                remaining = self.drop_remaining,
                "Dropping initial statistics"
            );
            Ok(())
        } else {
            self.runner.run(&mut self.collaborators, &stats).map(|outcome| {
                debug!(
                    frame_id = stats.frame_id,
                    timestamp_us = outcome.sync.timestamp_us(),
                    exposure_applied = outcome.exposure_applied,
                    "3A run"
                );
            })
        };
        if let Err(e) = &run_status {
            warn!(frame_id = stats.frame_id, error = %e, "3A run failed, evaluating states anyway");
        }

        self.last_statistics_frame = Some(
            self.last_statistics_frame
                .map_or(stats.frame_id, |last| last.max(stats.frame_id)),
        );

        let (covered, waiting): (VecDeque<FrameEvent>, VecDeque<FrameEvent>) = self
            .unevaluated
            .drain(..)
            .partition(|f| f.exposure_id <= stats.frame_id);
        self.unevaluated = waiting;

        let mut status = run_status;
        for frame in covered {
            let result = self.evaluate_frame(&frame, Some(&stats));
            if status.is_ok() {
                status = result;
            }
        }
        status
    }

    /// Force metadata for `request_id`: evaluate every queued frame up to its
    /// frame, or assemble from the current state if it has no frame yet.
    pub fn on_metadata_requestable(&mut self, request_id: u32) -> AaaResult<()> {
        let Some(target) = self.requests.position(request_id) else {
            return Err(AaaError::OutOfRange(format!("request {} is not pending", request_id)));
        };

        let mut status = Ok(());
        while let Some(frame) = self.unevaluated.front().copied() {
            let covered = self
                .requests
                .position(frame.request_id)
                .is_none_or(|pos| pos <= target);
            if !covered {
                break;
            }
            self.unevaluated.pop_front();
            let result = self.evaluate_frame(&frame, None);
            if status.is_ok() {
                status = result;
            }
        }

        let ready = self.requests.get(request_id).is_some_and(|e| e.metadata_ready());
        if !ready {
            let exposure_id = self.requests.get(request_id).and_then(|e| e.exposure_id);
            let metadata = self.snapshot(request_id, exposure_id, None, FrameStatus::Ok);
            self.requests.complete(request_id, metadata)?;
        }
        status
    }

    /// Leave the flash sequence and disarm the flash if it may still be lit
    pub fn exit_flash_sequence(&mut self) {
        if self.sequencer.exit() {
            self.disarm_flash();
        }
    }

    pub fn reconfigure(&mut self, exposure_delay_frames: u32) {
        self.runner.reconfigure(exposure_delay_frames);
        self.drop_remaining = self.config.drop_initial_statistics;
        self.last_statistics_frame = None;
    }

    /// Discard pending work and return every machine to its initial state
    pub fn teardown(&mut self) {
        let dropped_requests = self.requests.clear();
        let dropped_frames = self.unevaluated.len();
        self.unevaluated.clear();
        self.exit_flash_sequence();
        self.sequencer.reset();
        self.ae.reset();
        self.af.reset();
        self.awb.reset();
        self.runner.invalidate();
        self.pending_triggers = CaptureTriggers::default();
        self.last_statistics_frame = None;
        self.exposed_hold = 0;
        self.outbox.clear();
        info!(dropped_requests, dropped_frames, "3A session torn down");
    }

    pub fn runner(&self) -> &AlgorithmRunner {
        &self.runner
    }

    pub fn runner_mut(&mut self) -> &mut AlgorithmRunner {
        &mut self.runner
    }

    pub fn ae(&self) -> &AeStateMachine {
        &self.ae
    }

    pub fn af(&self) -> &AfStateMachine {
        &self.af
    }

    pub fn awb(&self) -> &AwbStateMachine {
        &self.awb
    }

    pub fn sequencer(&self) -> &FlashSequencer {
        &self.sequencer
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    pub fn unevaluated_frames(&self) -> usize {
        self.unevaluated.len()
    }

    fn apply_triggers(&mut self, triggers: &CaptureTriggers) {
        match triggers.precapture {
            PrecaptureTrigger::Start => {
                self.pending_triggers.precapture = PrecaptureTrigger::Start;
                self.ae.set_trigger_id(triggers.precapture_id);
            }
            PrecaptureTrigger::Cancel => {
                self.pending_triggers.precapture = PrecaptureTrigger::Idle;
                self.ae.set_trigger_id(triggers.precapture_id);
                self.exit_flash_sequence();
            }
            PrecaptureTrigger::Idle => {}
        }
        if triggers.af != AfTrigger::Idle {
            self.pending_triggers.af = triggers.af;
            self.af.set_trigger_id(triggers.af_id);
        }
        debug!(
            precapture = ?triggers.precapture,
            af = ?triggers.af,
            "Applied triggers"
        );
    }

    fn apply_settings(&mut self, settings: &CaptureSettings) {
        let was_locked = self.runner.controls().ae_lock;
        if settings.ae_lock && !was_locked {
            self.ae.set_lock_flash(self.runner.flash_necessary());
        }

        let flash_mode = self.flash_mode_for(settings.flash_mode);
        let controls = self.runner.controls_mut();
        controls.exposure_mode = settings.exposure_mode;
        controls.ae_lock = settings.ae_lock;
        controls.af_mode = settings.af_mode;
        controls.awb_mode = settings.awb_mode;
        controls.awb_lock = settings.awb_lock;
        controls.flash_mode = flash_mode;
        controls.ev_shift = settings.ev_shift;
        controls.manual_exposure_time_us = settings.manual_exposure_time_us;
        controls.manual_iso = settings.manual_iso;
        controls.frame_use = settings.frame_use;
        self.settings = settings.clone();
    }

    /// Flash is forced off in low-power mode unless a sequence is requested
    fn flash_mode_for(&self, requested: FlashMode) -> FlashMode {
        if self.low_power && !self.sequencer.is_requested() {
            FlashMode::Off
        } else {
            requested
        }
    }

    fn effective_flash_mode(&self) -> FlashMode {
        self.flash_mode_for(self.settings.flash_mode)
    }

    fn flash_needed(&self) -> bool {
        if self.collaborators.flash.is_none() {
            return false;
        }
        let controls = self.runner.controls();
        let locked = controls.ae_lock.then(|| self.ae.lock_flash());
        flash::flash_necessary(controls.flash_mode, self.runner.flash_necessary(), locked)
    }

    /// One evaluation step for a produced frame
    fn evaluate_frame(
        &mut self,
        frame: &FrameEvent,
        stats: Option<&StatisticsEvent>,
    ) -> AaaResult<()> {
        let flash_needed = self.flash_needed();

        let af_step = self.af.step(&AfInputs {
            mode: self.runner.controls().af_mode,
            trigger: std::mem::take(&mut self.pending_triggers.af),
            status: self.runner.af_status(),
        });
        if let Some(lock) = af_step.lock {
            self.runner.controls_mut().af_lock = lock;
        }

        let precapture_start =
            std::mem::take(&mut self.pending_triggers.precapture) == PrecaptureTrigger::Start;
        let controls = self.runner.controls();
        let ae_step = self.ae.step(&AeInputs {
            auto_mode: controls.exposure_mode == ExposureMode::Auto,
            lock: controls.ae_lock,
            converged: self.runner.ae_converged(),
            flash_needed,
            precapture_start,
            flash_sequence_running: self.sequencer.is_requested(),
            flash_exposed: self.sequencer.is_exposed(),
        });
        if ae_step.start_flash {
            self.sequencer.enter();
        }

        let controls = self.runner.controls();
        self.awb.step(&AwbInputs {
            auto_mode: controls.awb_mode == AwbMode::Auto,
            lock: controls.awb_lock,
            converged: self.runner.awb_converged(),
        });

        let metering_event = StatisticsEvent {
            frame_id: frame.exposure_id,
            timestamp_us: stats.map_or(frame.timestamp_us, |s| s.timestamp_us),
        };
        let status = match self.sequencer.step(flash_needed, frame.status) {
            FlashAction::None => Ok(()),
            FlashAction::Meter(stage) => self.meter(&metering_event, stage),
            FlashAction::Fire => self.fire_flash(),
            FlashAction::Completed => {
                self.disarm_flash();
                self.meter(&metering_event, MeteringStage::MainFlash)
            }
            FlashAction::Failed(e) => {
                self.disarm_flash();
                Err(AaaError::FlashSequence(e))
            }
        };

        let metadata = self.snapshot(
            frame.request_id,
            Some(frame.exposure_id),
            Some(frame.timestamp_us),
            frame.status,
        );
        let completed = self.requests.complete(frame.request_id, metadata);
        status.and(completed)
    }

    fn meter(&mut self, event: &StatisticsEvent, stage: MeteringStage) -> AaaResult<()> {
        self.runner
            .run_metering(&mut self.collaborators, event, stage)
            .map(|_| ())
            .inspect_err(|e| warn!(?stage, error = %e, "Metering pass failed"))
    }

    fn fire_flash(&mut self) -> AaaResult<()> {
        match self.collaborators.flash.as_mut() {
            Some(unit) => unit.fire(PRE_FLASH_PULSES).inspect_err(|e| {
                error!(error = %e, "Failed to fire pre-flash");
            }),
            None => Ok(()),
        }
    }

    fn disarm_flash(&mut self) {
        if let Some(unit) = self.collaborators.flash.as_mut() {
            if let Err(e) = unit.fire(0) {
                error!(error = %e, "Failed to disarm flash");
            }
        }
    }

    /// Assemble the metadata reported for a request from the current state
    fn snapshot(
        &mut self,
        request_id: u32,
        exposure_id: Option<u32>,
        timestamp_us: Option<i64>,
        status: FrameStatus,
    ) -> ResultMetadata {
        // Drivers under-report the exposed flag on the frames after the flash
        let reported = if status == FrameStatus::FlashExposed {
            self.exposed_hold = self.config.flash.exposed_hold_frames;
            status
        } else if self.exposed_hold > 0 {
            self.exposed_hold -= 1;
            FrameStatus::FlashExposed
        } else {
            status
        };

        let flash_state = if self.collaborators.flash.is_none() {
            FlashState::Unavailable
        } else {
            match reported {
                FrameStatus::FlashExposed => FlashState::Fired,
                FrameStatus::FlashPartial => FlashState::Partial,
                _ => FlashState::Ready,
            }
        };

        let exposure = self.runner.active_exposure();
        ResultMetadata {
            request_id,
            exposure_id,
            ae_state: self.ae.state(),
            af_state: self.af.state(),
            awb_state: self.awb.state(),
            ae_trigger_id: self.ae.trigger_id(),
            af_trigger_id: self.af.trigger_id(),
            exposure_time_us: exposure.map(|e| e.exposure_time_us),
            iso: exposure.map(|e| e.iso),
            flash_fired: flash_state == FlashState::Fired,
            flash_state,
            ae_precapture_active: self.sequencer.precapture_active(),
            timestamp_us,
        }
    }
}
