// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the pre-flash sequence

use camera3a::aiq::runner::MeteringStage;
use camera3a::aiq::types::FrameStatus;
use camera3a::config::FlashConfig;
use camera3a::flash::{FlashAction, FlashSequenceState, FlashSequencer};
use camera3a::FlashError;
use proptest::prelude::*;

fn armed_sequencer(config: FlashConfig) -> FlashSequencer {
    let mut seq = FlashSequencer::new(config);
    seq.enter();
    for _ in 0..50 {
        if seq.state() == FlashSequenceState::WaitExposed {
            return seq;
        }
        seq.step(true, FrameStatus::Ok);
    }
    panic!("sequence never armed the flash");
}

#[test]
fn test_stage_order() {
    let mut seq = FlashSequencer::new(FlashConfig::default());
    seq.enter();
    let actions: Vec<FlashAction> = (0..9)
        .map(|_| seq.step(true, FrameStatus::Ok))
        .filter(|a| *a != FlashAction::None)
        .collect();
    assert_eq!(
        actions,
        vec![
            FlashAction::Meter(MeteringStage::Baseline),
            FlashAction::Meter(MeteringStage::PreFlash),
            FlashAction::Fire,
        ]
    );
}

#[test]
fn test_no_exposed_frame_within_timeout_fails() {
    let mut seq = armed_sequencer(FlashConfig::default());
    let actions: Vec<FlashAction> = (0..5).map(|_| seq.step(true, FrameStatus::Ok)).collect();
    assert_eq!(
        actions.last(),
        Some(&FlashAction::Failed(FlashError::Timeout { frames: 5 }))
    );
    assert_eq!(seq.state(), FlashSequenceState::Idle);
}

#[test]
fn test_zero_skip_frames_acts_every_frame() {
    let config = FlashConfig {
        skip_frames: 0,
        ..Default::default()
    };
    let mut seq = FlashSequencer::new(config);
    seq.enter();
    assert_eq!(seq.step(true, FrameStatus::Ok), FlashAction::Meter(MeteringStage::Baseline));
    assert_eq!(seq.step(true, FrameStatus::Ok), FlashAction::Meter(MeteringStage::PreFlash));
    assert_eq!(seq.step(true, FrameStatus::Ok), FlashAction::Fire);
}

proptest! {
    #[test]
    fn test_exposed_within_timeout_completes(exposed_at in 1u32..=5) {
        let mut seq = armed_sequencer(FlashConfig::default());
        for frame in 1..=exposed_at {
            let status = if frame == exposed_at {
                FrameStatus::FlashExposed
            } else {
                FrameStatus::Ok
            };
            let action = seq.step(true, status);
            if frame == exposed_at {
                prop_assert_eq!(action, FlashAction::Completed);
            } else {
                prop_assert_eq!(action, FlashAction::None);
            }
        }
        prop_assert_eq!(seq.state(), FlashSequenceState::Exposed);
    }
}
