// SPDX-License-Identifier: GPL-3.0-only

//! Autofocus state machine
//!
//! Continuous modes and triggered (auto/macro) modes run two separate
//! sub-machines. Continuous modes use the PASSIVE_* and *_LOCKED states;
//! triggered modes use INACTIVE, ACTIVE_SCAN and *_LOCKED.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aiq::types::{AfMode, AfStatus, AfTrigger};

/// Reported AF state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AfState {
    #[default]
    Inactive,
    PassiveScan,
    PassiveFocused,
    PassiveUnfocused,
    ActiveScan,
    FocusedLocked,
    NotFocusedLocked,
}

impl AfState {
    pub fn is_locked(self) -> bool {
        matches!(self, AfState::FocusedLocked | AfState::NotFocusedLocked)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AfInputs {
    pub mode: AfMode,
    pub trigger: AfTrigger,
    /// Latest status reported by the AF algorithm
    pub status: AfStatus,
}

/// Result of one AF step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AfStep {
    pub state: AfState,
    /// New focus lock for the algorithm runner, `None` to leave it
    pub lock: Option<bool>,
}

impl AfStep {
    fn stay(state: AfState) -> Self {
        Self { state, lock: None }
    }

    fn to(state: AfState, lock: bool) -> Self {
        Self {
            state,
            lock: Some(lock),
        }
    }
}

/// Pure transition function
pub fn next_af_state(current: AfState, inputs: &AfInputs) -> AfStep {
    match inputs.mode {
        AfMode::Off | AfMode::Edof => AfStep::stay(AfState::Inactive),
        AfMode::ContinuousVideo | AfMode::ContinuousPicture => continuous(current, inputs),
        AfMode::Auto | AfMode::Macro => triggered(current, inputs),
    }
}

fn continuous(current: AfState, inputs: &AfInputs) -> AfStep {
    use AfState::*;
    let status = inputs.status;

    if inputs.trigger == AfTrigger::Cancel {
        return AfStep::to(Inactive, false);
    }

    match (current, inputs.trigger) {
        (Inactive, AfTrigger::Start) => AfStep::to(NotFocusedLocked, true),
        (Inactive, _) => match status {
            AfStatus::Success => AfStep::stay(PassiveFocused),
            AfStatus::Busy => AfStep::stay(PassiveScan),
            _ => AfStep::stay(Inactive),
        },

        (PassiveScan, AfTrigger::Start) => match status {
            AfStatus::Success => AfStep::to(FocusedLocked, true),
            AfStatus::Fail | AfStatus::Busy => AfStep::to(NotFocusedLocked, true),
            AfStatus::Idle => AfStep::stay(PassiveScan),
        },
        (PassiveScan, _) => match status {
            AfStatus::Fail => AfStep::stay(PassiveUnfocused),
            AfStatus::Success => AfStep::stay(PassiveFocused),
            _ => AfStep::stay(PassiveScan),
        },

        (PassiveFocused | PassiveUnfocused, AfTrigger::Start) => {
            match (current, status) {
                (PassiveFocused, AfStatus::Success) => AfStep::to(FocusedLocked, true),
                (PassiveUnfocused, AfStatus::Fail) => AfStep::to(NotFocusedLocked, true),
                _ => AfStep::stay(current),
            }
        }
        (PassiveFocused | PassiveUnfocused, _) => match status {
            AfStatus::Busy => AfStep::stay(PassiveScan),
            AfStatus::Fail => AfStep::stay(Inactive),
            _ => AfStep::stay(current),
        },

        (FocusedLocked | NotFocusedLocked, _) => AfStep::stay(current),

        (ActiveScan, _) => {
            warn!("ACTIVE_SCAN is not valid in continuous AF, resetting");
            AfStep::stay(Inactive)
        }
    }
}

fn triggered(current: AfState, inputs: &AfInputs) -> AfStep {
    use AfState::*;
    let status = inputs.status;

    match current {
        Inactive => match inputs.trigger {
            AfTrigger::Start if status == AfStatus::Success => AfStep::to(FocusedLocked, true),
            AfTrigger::Start => AfStep::to(ActiveScan, false),
            AfTrigger::Cancel => AfStep::to(Inactive, false),
            AfTrigger::Idle => AfStep::to(Inactive, true),
        },
        ActiveScan => match (inputs.trigger, status) {
            (AfTrigger::Cancel, _) => AfStep::to(Inactive, false),
            (_, AfStatus::Success) => AfStep::to(FocusedLocked, true),
            (_, AfStatus::Fail) => AfStep::to(NotFocusedLocked, true),
            _ => AfStep::stay(ActiveScan),
        },
        FocusedLocked | NotFocusedLocked => match inputs.trigger {
            AfTrigger::Cancel => AfStep::to(Inactive, false),
            AfTrigger::Start => AfStep::to(ActiveScan, false),
            AfTrigger::Idle => AfStep::stay(current),
        },
        PassiveScan | PassiveFocused | PassiveUnfocused => {
            warn!(state = ?current, "Passive AF state is not valid in triggered AF, resetting");
            AfStep::stay(Inactive)
        }
    }
}

/// AF machine with its trigger bookkeeping
#[derive(Debug, Clone, Default)]
pub struct AfStateMachine {
    state: AfState,
    trigger_id: i32,
    mode: AfMode,
}

impl AfStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AfState {
        self.state
    }

    pub fn trigger_id(&self) -> i32 {
        self.trigger_id
    }

    pub fn set_trigger_id(&mut self, id: i32) {
        self.trigger_id = id;
    }

    pub fn step(&mut self, inputs: &AfInputs) -> AfStep {
        // A mode switch restarts from INACTIVE
        if inputs.mode != self.mode {
            if self.state != AfState::Inactive {
                debug!(from = ?self.mode, to = ?inputs.mode, "AF mode changed, resetting state");
            }
            self.mode = inputs.mode;
            self.state = AfState::Inactive;
        }

        let step = next_af_state(self.state, inputs);
        if step.state != self.state {
            debug!(
                from = ?self.state,
                to = ?step.state,
                trigger = ?inputs.trigger,
                status = ?inputs.status,
                "AF state"
            );
        }
        self.state = step.state;
        step
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(mode: AfMode, trigger: AfTrigger, status: AfStatus) -> AfInputs {
        AfInputs {
            mode,
            trigger,
            status,
        }
    }

    #[test]
    fn test_continuous_scan_to_focused() {
        let cap = AfMode::ContinuousPicture;
        let step = next_af_state(AfState::Inactive, &inputs(cap, AfTrigger::Idle, AfStatus::Busy));
        assert_eq!(step.state, AfState::PassiveScan);
        let step = next_af_state(step.state, &inputs(cap, AfTrigger::Idle, AfStatus::Success));
        assert_eq!(step.state, AfState::PassiveFocused);
        let step = next_af_state(step.state, &inputs(cap, AfTrigger::Start, AfStatus::Success));
        assert_eq!(step, AfStep::to(AfState::FocusedLocked, true));
    }

    #[test]
    fn test_cancel_always_unlocks() {
        for mode in [AfMode::ContinuousVideo, AfMode::Auto] {
            for state in [AfState::FocusedLocked, AfState::NotFocusedLocked] {
                let step = next_af_state(state, &inputs(mode, AfTrigger::Cancel, AfStatus::Idle));
                assert_eq!(step, AfStep::to(AfState::Inactive, false), "{:?} {:?}", mode, state);
            }
        }
    }

    #[test]
    fn test_triggered_start_in_locked_rescans() {
        let step = next_af_state(
            AfState::FocusedLocked,
            &inputs(AfMode::Auto, AfTrigger::Start, AfStatus::Success),
        );
        assert_eq!(step, AfStep::to(AfState::ActiveScan, false));
    }

    #[test]
    fn test_continuous_start_in_locked_stays() {
        let step = next_af_state(
            AfState::FocusedLocked,
            &inputs(AfMode::ContinuousPicture, AfTrigger::Start, AfStatus::Busy),
        );
        assert_eq!(step.state, AfState::FocusedLocked);
    }

    #[test]
    fn test_triggered_scan_result() {
        let step = next_af_state(
            AfState::ActiveScan,
            &inputs(AfMode::Macro, AfTrigger::Idle, AfStatus::Fail),
        );
        assert_eq!(step, AfStep::to(AfState::NotFocusedLocked, true));
    }

    #[test]
    fn test_off_and_edof_are_inactive() {
        for mode in [AfMode::Off, AfMode::Edof] {
            let step = next_af_state(
                AfState::PassiveFocused,
                &inputs(mode, AfTrigger::Start, AfStatus::Success),
            );
            assert_eq!(step.state, AfState::Inactive);
        }
    }

    #[test]
    fn test_mode_switch_resets() {
        let mut af = AfStateMachine::new();
        af.step(&inputs(AfMode::ContinuousPicture, AfTrigger::Idle, AfStatus::Busy));
        assert_eq!(af.state(), AfState::PassiveScan);
        af.step(&inputs(AfMode::Auto, AfTrigger::Idle, AfStatus::Busy));
        assert_eq!(af.state(), AfState::Inactive);
    }
}
