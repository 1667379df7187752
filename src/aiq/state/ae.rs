// SPDX-License-Identifier: GPL-3.0-only

//! Auto exposure state machine

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reported AE state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AeState {
    #[default]
    Inactive,
    Searching,
    Converged,
    FlashRequired,
    Locked,
    Precapture,
}

/// Everything the AE machine looks at for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AeInputs {
    /// AE on auto (false in manual mode)
    pub auto_mode: bool,
    pub lock: bool,
    pub converged: bool,
    pub flash_needed: bool,
    /// Precapture trigger START on this frame
    pub precapture_start: bool,
    /// A flash sequence has been requested and not finished
    pub flash_sequence_running: bool,
    /// The running flash sequence reached EXPOSED
    pub flash_exposed: bool,
}

/// Result of one AE step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AeStep {
    pub state: AeState,
    /// The caller must start the flash sequence
    pub start_flash: bool,
}

/// Pure transition function
pub fn next_ae_state(current: AeState, inputs: &AeInputs) -> AeStep {
    if !inputs.auto_mode {
        return AeStep {
            state: AeState::Inactive,
            start_flash: false,
        };
    }

    if inputs.precapture_start {
        return AeStep {
            state: AeState::Precapture,
            start_flash: inputs.flash_needed && !inputs.flash_sequence_running,
        };
    }

    let converged_state = if inputs.flash_needed {
        AeState::FlashRequired
    } else {
        AeState::Converged
    };

    let state = match current {
        AeState::Inactive => {
            if inputs.lock {
                AeState::Locked
            } else {
                AeState::Searching
            }
        }
        AeState::Searching => {
            if inputs.lock {
                AeState::Locked
            } else if inputs.converged {
                converged_state
            } else {
                AeState::Searching
            }
        }
        AeState::Converged | AeState::FlashRequired => {
            if inputs.lock {
                AeState::Locked
            } else if !inputs.converged {
                AeState::Searching
            } else {
                current
            }
        }
        AeState::Locked => {
            if inputs.lock {
                AeState::Locked
            } else if inputs.converged {
                converged_state
            } else {
                AeState::Searching
            }
        }
        AeState::Precapture => {
            if !inputs.flash_sequence_running && inputs.converged {
                if inputs.lock {
                    AeState::Locked
                } else {
                    AeState::Converged
                }
            } else if inputs.flash_sequence_running && inputs.flash_exposed {
                AeState::FlashRequired
            } else {
                AeState::Precapture
            }
        }
    };

    AeStep {
        state,
        start_flash: false,
    }
}

/// AE machine with its trigger bookkeeping
#[derive(Debug, Clone, Default)]
pub struct AeStateMachine {
    state: AeState,
    trigger_id: i32,
    /// Flash decision captured when AE was locked
    lock_flash: bool,
}

impl AeStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AeState {
        self.state
    }

    /// Id of the last precapture trigger seen
    pub fn trigger_id(&self) -> i32 {
        self.trigger_id
    }

    pub fn set_trigger_id(&mut self, id: i32) {
        self.trigger_id = id;
    }

    /// Remember the flash decision at lock time
    pub fn set_lock_flash(&mut self, flash_needed: bool) {
        self.lock_flash = flash_needed;
    }

    pub fn lock_flash(&self) -> bool {
        self.lock_flash
    }

    pub fn step(&mut self, inputs: &AeInputs) -> AeStep {
        let step = next_ae_state(self.state, inputs);
        if step.state != self.state {
            debug!(from = ?self.state, to = ?step.state, "AE state");
        }
        self.state = step.state;
        step
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
