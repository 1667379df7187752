// SPDX-License-Identifier: GPL-3.0-only

//! Auto white balance state machine

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reported AWB state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AwbState {
    #[default]
    Inactive,
    Searching,
    Converged,
    Locked,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AwbInputs {
    pub auto_mode: bool,
    pub lock: bool,
    pub converged: bool,
}

/// Pure transition function
pub fn next_awb_state(current: AwbState, inputs: &AwbInputs) -> AwbState {
    if !inputs.auto_mode && current != AwbState::Locked {
        return AwbState::Inactive;
    }

    let unlocked = if inputs.converged {
        AwbState::Converged
    } else {
        AwbState::Searching
    };

    match current {
        _ if inputs.lock => AwbState::Locked,
        AwbState::Inactive | AwbState::Locked => unlocked,
        AwbState::Searching if inputs.converged => AwbState::Converged,
        AwbState::Converged if !inputs.converged => AwbState::Searching,
        other => other,
    }
}

#[derive(Debug, Clone, Default)]
pub struct AwbStateMachine {
    state: AwbState,
}

impl AwbStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AwbState {
        self.state
    }

    pub fn step(&mut self, inputs: &AwbInputs) -> AwbState {
        let next = next_awb_state(self.state, inputs);
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "AWB state");
        }
        self.state = next;
        next
    }

    pub fn reset(&mut self) {
        self.state = AwbState::Inactive;
    }
}
