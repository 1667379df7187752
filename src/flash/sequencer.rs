// SPDX-License-Identifier: GPL-3.0-only

//! Pre-flash metering sequence
//!
//! ```text
//! IDLE -> START -> METER_PHASE1 -> METER_PHASE2 -> WAIT_EXPOSED -> EXPOSED
//!                                                      |
//!                                                      +-> IDLE (failure)
//! ```
//!
//! The sequencer is stepped once per produced frame and only returns what the
//! caller has to do next ([`FlashAction`]). Metering passes and flash commands
//! are executed by the session.

use tracing::{debug, info, warn};

use crate::aiq::runner::MeteringStage;
use crate::aiq::types::FrameStatus;
use crate::config::FlashConfig;
use crate::errors::FlashError;

/// Stage of the pre-flash sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlashSequenceState {
    #[default]
    Idle,
    /// Letting the pipeline settle after the flash decision
    Start,
    /// Baseline metering done, waiting for the sensor to apply it
    MeterPhase1,
    /// Pre-flash metering done, waiting for the sensor to apply it
    MeterPhase2,
    /// Flash fired, polling frames for a flash-exposed one
    WaitExposed,
    /// Main-flash exposure computed; held until the caller exits
    Exposed,
    /// Exited by the caller; becomes IDLE on the next step
    Exit,
}

/// What the caller must do after a step
#[derive(Debug, Clone, PartialEq)]
pub enum FlashAction {
    None,
    /// Run a metering pass
    Meter(MeteringStage),
    /// Fire the pre-flash
    Fire,
    /// A flash-exposed frame arrived: disarm the flash and run the main-flash pass
    Completed,
    /// Sequence aborted to IDLE: disarm the flash and fall back to ambient light
    Failed(FlashError),
}

#[derive(Debug, Clone, Default)]
pub struct FlashSequencer {
    state: FlashSequenceState,
    /// Sequence requested by a precapture trigger
    requested: bool,
    skip_remaining: u32,
    wait_frames: u32,
    config: FlashConfig,
}

impl FlashSequencer {
    pub fn new(config: FlashConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn state(&self) -> FlashSequenceState {
        self.state
    }

    /// Request a sequence; it starts on the next step
    pub fn enter(&mut self) {
        if !self.requested {
            debug!("Flash sequence requested");
        }
        self.requested = true;
    }

    /// Abort or finish the sequence. Returns true when the flash may still be
    /// armed and must be disarmed by the caller.
    pub fn exit(&mut self) -> bool {
        let armed = self.state == FlashSequenceState::WaitExposed;
        if self.is_active() {
            info!(state = ?self.state, "Stopping flash sequence");
            self.state = FlashSequenceState::Exit;
        }
        self.requested = false;
        self.skip_remaining = 0;
        self.wait_frames = 0;
        armed
    }

    /// Requested and not yet finished
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Any stage between START and EXPOSED. Regular 3A runs are suspended.
    pub fn is_active(&self) -> bool {
        !matches!(
            self.state,
            FlashSequenceState::Idle | FlashSequenceState::Exit
        )
    }

    /// The sequence is still metering (reported as AE precapture in progress)
    pub fn precapture_active(&self) -> bool {
        matches!(
            self.state,
            FlashSequenceState::Start
                | FlashSequenceState::MeterPhase1
                | FlashSequenceState::MeterPhase2
                | FlashSequenceState::WaitExposed
        )
    }

    pub fn is_exposed(&self) -> bool {
        self.state == FlashSequenceState::Exposed
    }

    /// Advance by one frame.
    ///
    /// `flash_needed` is only consulted when a requested sequence starts; if
    /// flash is not needed the sequence goes straight to EXPOSED.
    pub fn step(&mut self, flash_needed: bool, status: FrameStatus) -> FlashAction {
        if self.state == FlashSequenceState::Exit {
            self.state = FlashSequenceState::Idle;
        }
        if !self.requested {
            return FlashAction::None;
        }

        if self.state == FlashSequenceState::Idle {
            if !flash_needed {
                info!("Flash not needed, skipping pre-flash");
                self.state = FlashSequenceState::Exposed;
                return FlashAction::None;
            }
            info!("Starting pre-flash sequence");
            self.state = FlashSequenceState::Start;
            self.skip_remaining = self.config.skip_frames;
        }

        match self.state {
            FlashSequenceState::Start => {
                if self.skip_frame() {
                    return FlashAction::None;
                }
                self.advance(FlashSequenceState::MeterPhase1);
                FlashAction::Meter(MeteringStage::Baseline)
            }
            FlashSequenceState::MeterPhase1 => {
                if self.skip_frame() {
                    return FlashAction::None;
                }
                self.advance(FlashSequenceState::MeterPhase2);
                FlashAction::Meter(MeteringStage::PreFlash)
            }
            FlashSequenceState::MeterPhase2 => {
                if self.skip_frame() {
                    return FlashAction::None;
                }
                self.wait_frames = 0;
                self.advance(FlashSequenceState::WaitExposed);
                FlashAction::Fire
            }
            FlashSequenceState::WaitExposed => self.wait_exposed(status),
            FlashSequenceState::Exposed
            | FlashSequenceState::Idle
            | FlashSequenceState::Exit => FlashAction::None,
        }
    }

    fn wait_exposed(&mut self, status: FrameStatus) -> FlashAction {
        self.wait_frames += 1;

        if status == FrameStatus::FlashExposed {
            info!(frames = self.wait_frames, "Pre-flash exposed frame received");
            self.state = FlashSequenceState::Exposed;
            return FlashAction::Completed;
        }

        let error = if !matches!(status, FrameStatus::Ok | FrameStatus::FlashPartial) {
            Some(FlashError::FrameStatus(status))
        } else if self.wait_frames >= self.config.timeout_frames {
            Some(FlashError::Timeout {
                frames: self.wait_frames,
            })
        } else {
            None
        };

        match error {
            Some(error) => {
                warn!(error = %error, "Flash sequence failed");
                self.state = FlashSequenceState::Idle;
                self.requested = false;
                self.wait_frames = 0;
                FlashAction::Failed(error)
            }
            None => FlashAction::None,
        }
    }

    /// Consume one skip frame; false once the skip budget is spent
    fn skip_frame(&mut self) -> bool {
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            true
        } else {
            false
        }
    }

    fn advance(&mut self, next: FlashSequenceState) {
        debug!(from = ?self.state, to = ?next, "Flash sequence");
        self.state = next;
        self.skip_remaining = self.config.skip_frames;
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}
