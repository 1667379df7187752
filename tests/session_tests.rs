// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests against the simulated camera

use std::sync::Arc;

use camera3a::aiq::frame_sync::FrameSyncTracker;
use camera3a::aiq::state::{AeState, AfState, AwbState};
use camera3a::aiq::types::{CaptureTriggers, FlashState, PrecaptureTrigger};
use camera3a::backends::simulated::{SimulatedRig, SimulatedScene};
use camera3a::flash::FlashBank;
use camera3a::flash::sysfs::SysfsFlash;
use camera3a::{
    AaaError, CaptureRequest, CaptureSettings, Config, FlashMode, FrameEvent, ResultMetadata,
    Session, SessionEvent, SessionHandle, StatisticsEvent,
};

const FRAME_US: i64 = 33_333;

fn auto_flash() -> CaptureSettings {
    CaptureSettings {
        flash_mode: FlashMode::Auto,
        ..Default::default()
    }
}

fn session(rig: &SimulatedRig, config: Config) -> Session {
    Session::new(config, rig.collaborators(), Arc::new(FrameSyncTracker::new()))
}

/// Request, frame and statistics for one frame; returns the released metadata
fn drive(
    session: &mut Session,
    rig: &SimulatedRig,
    frame: u32,
    triggers: CaptureTriggers,
) -> Vec<ResultMetadata> {
    session
        .handle(SessionEvent::Request(CaptureRequest {
            request_id: frame,
            settings: Some(auto_flash()),
            triggers,
        }))
        .unwrap();
    session
        .handle(SessionEvent::FrameProduced(FrameEvent {
            request_id: frame,
            exposure_id: frame,
            timestamp_us: frame as i64 * FRAME_US,
            status: rig.next_frame_status(),
        }))
        .unwrap();
    // Flash failures surface as errors; metadata is still released
    let _ = session.handle(SessionEvent::StatisticsReady(StatisticsEvent {
        frame_id: frame,
        timestamp_us: frame as i64 * FRAME_US + 25_000,
    }));
    session.take_results()
}

fn drive_one(session: &mut Session, rig: &SimulatedRig, frame: u32) -> ResultMetadata {
    let mut results = drive(session, rig, frame, CaptureTriggers::default());
    assert_eq!(results.len(), 1, "frame {} should release exactly one result", frame);
    results.remove(0)
}

fn precapture(id: i32) -> CaptureTriggers {
    CaptureTriggers {
        precapture: PrecaptureTrigger::Start,
        precapture_id: id,
        ..Default::default()
    }
}

#[test]
fn test_bright_scene_converges() {
    let rig = SimulatedRig::new(SimulatedScene::default());
    let mut session = session(&rig, Config::default());
    let mut last = None;
    for frame in 1..=10 {
        last = Some(drive_one(&mut session, &rig, frame));
    }
    let last = last.unwrap();
    assert_eq!(last.ae_state, AeState::Converged);
    assert_eq!(last.awb_state, AwbState::Converged);
    assert_eq!(last.af_state, AfState::PassiveFocused);
    assert_eq!(last.exposure_time_us, Some(10_000));
    assert_eq!(last.flash_state, FlashState::Ready);
}

#[test]
fn test_dark_scene_runs_pre_flash() {
    let rig = SimulatedRig::new(SimulatedScene {
        dark: true,
        ..Default::default()
    });
    let mut session = session(&rig, Config::default());
    for frame in 1..=10 {
        drive_one(&mut session, &rig, frame);
    }
    assert_eq!(session.ae().state(), AeState::FlashRequired);

    let trigger = drive(&mut session, &rig, 11, precapture(11)).remove(0);
    assert_eq!(trigger.ae_state, AeState::Precapture);
    assert_eq!(trigger.ae_trigger_id, 11);
    assert!(trigger.ae_precapture_active);

    // Two skipped frames around each of baseline, pre-flash and fire
    for frame in 12..=19 {
        let meta = drive_one(&mut session, &rig, frame);
        assert!(meta.ae_precapture_active, "frame {}", frame);
        assert!(!meta.flash_fired);
    }
    assert_eq!(rig.flash_fires(), vec![1]);

    let exposed = drive_one(&mut session, &rig, 20);
    assert!(exposed.flash_fired);
    assert_eq!(exposed.flash_state, FlashState::Fired);
    assert!(!exposed.ae_precapture_active);
    assert_eq!(rig.flash_fires(), vec![1, 0], "flash disarmed after the exposed frame");

    let after = drive_one(&mut session, &rig, 21);
    assert_eq!(after.ae_state, AeState::FlashRequired);
    // Drivers under-report the exposed flag, so it is held
    assert!(after.flash_fired);

    session.handle(SessionEvent::ExitFlashSequence).unwrap();
    drive_one(&mut session, &rig, 22);
    assert!(!session.sequencer().is_requested());
}

#[test]
fn test_pre_flash_drives_every_led_in_the_bank() {
    let root = tempfile::tempdir().unwrap();
    let led = root.path().join("white:flash");
    std::fs::create_dir_all(&led).unwrap();
    std::fs::write(led.join("max_brightness"), "255").unwrap();
    std::fs::write(led.join("brightness"), "0").unwrap();

    let rig = SimulatedRig::new(SimulatedScene {
        dark: true,
        ..Default::default()
    });
    let mut collaborators = rig.collaborators();
    let mut bank = FlashBank::new();
    if let Some(simulated) = collaborators.flash.take() {
        bank.push(simulated);
    }
    for unit in SysfsFlash::discover_in(root.path()) {
        bank.push(Box::new(unit));
    }
    collaborators.flash = Some(Box::new(bank));
    let mut session = Session::new(
        Config::default(),
        collaborators,
        Arc::new(FrameSyncTracker::new()),
    );

    for frame in 1..=10 {
        drive_one(&mut session, &rig, frame);
    }
    drive(&mut session, &rig, 11, precapture(11));
    for frame in 12..=19 {
        drive_one(&mut session, &rig, frame);
    }
    let brightness = || std::fs::read_to_string(led.join("brightness")).unwrap();
    assert_eq!(brightness(), "255", "LED lit with the pre-flash");

    let exposed = drive_one(&mut session, &rig, 20);
    assert!(exposed.flash_fired);
    assert_eq!(brightness(), "0", "LED disarmed after the exposed frame");
}

#[test]
fn test_flash_timeout_falls_back_to_ambient() {
    let rig = SimulatedRig::new(SimulatedScene {
        dark: true,
        flash_fails: true,
        ..Default::default()
    });
    let mut session = session(&rig, Config::default());
    for frame in 1..=10 {
        drive_one(&mut session, &rig, frame);
    }
    drive(&mut session, &rig, 11, precapture(11));
    for frame in 12..=23 {
        assert!(drive_one(&mut session, &rig, frame).ae_precapture_active);
    }
    let failed = drive_one(&mut session, &rig, 24);
    assert!(!failed.ae_precapture_active);
    assert!(!failed.flash_fired);
    assert_eq!(rig.flash_fires(), vec![1, 0]);

    let next = drive_one(&mut session, &rig, 25);
    assert_eq!(next.ae_state, AeState::Converged);
}

#[test]
fn test_bright_precapture_skips_flash() {
    let rig = SimulatedRig::new(SimulatedScene::default());
    let mut session = session(&rig, Config::default());
    for frame in 1..=10 {
        drive_one(&mut session, &rig, frame);
    }
    let trigger = drive(&mut session, &rig, 11, precapture(3)).remove(0);
    assert_eq!(trigger.ae_state, AeState::Precapture);
    assert!(!trigger.ae_precapture_active);

    let next = drive_one(&mut session, &rig, 12);
    assert_eq!(next.ae_state, AeState::Converged);
    assert!(rig.flash_fires().is_empty());
}

#[test]
fn test_low_power_inhibits_flash() {
    let rig = SimulatedRig::new(SimulatedScene {
        dark: true,
        ..Default::default()
    });
    let mut session = session(&rig, Config::default());
    session.handle(SessionEvent::LowPowerMode(true)).unwrap();
    for frame in 1..=10 {
        drive_one(&mut session, &rig, frame);
    }
    assert_eq!(session.ae().state(), AeState::Converged);
    drive(&mut session, &rig, 11, precapture(11));
    drive_one(&mut session, &rig, 12);
    assert!(rig.flash_fires().is_empty());
}

#[test]
fn test_initial_statistics_dropped() {
    let rig = SimulatedRig::new(SimulatedScene::default());
    let config = Config {
        drop_initial_statistics: 2,
        ..Default::default()
    };
    let mut session = session(&rig, config);
    for frame in 1..=3 {
        drive_one(&mut session, &rig, frame);
    }
    assert_eq!(rig.statistics_read(), 1);
}

#[test]
fn test_reconfigure_resizes_history() {
    let rig = SimulatedRig::new(SimulatedScene::default());
    let mut session = session(&rig, Config::default());
    drive_one(&mut session, &rig, 1);
    session
        .handle(SessionEvent::Reconfigure {
            exposure_delay_frames: 4,
        })
        .unwrap();
    assert_eq!(session.runner().history().depth(), 5);
    assert!(session.runner().history().is_empty());
}

#[test]
fn test_worker_releases_results_in_order() {
    let rig = SimulatedRig::new(SimulatedScene::default());
    let (mut handle, mut results) =
        SessionHandle::spawn(Config::default(), rig.collaborators()).unwrap();

    for frame in 1..=5u32 {
        handle
            .process_request(CaptureRequest {
                request_id: frame,
                ..Default::default()
            })
            .unwrap();
        handle.notify_sof(frame, frame as i64 * FRAME_US).unwrap();
        handle
            .notify_frame_produced(FrameEvent {
                request_id: frame,
                exposure_id: frame,
                timestamp_us: frame as i64 * FRAME_US,
                status: Default::default(),
            })
            .unwrap();
        handle
            .notify_statistics_ready(StatisticsEvent {
                frame_id: frame,
                timestamp_us: frame as i64 * FRAME_US + 25_000,
            })
            .unwrap();
    }

    let ids: Vec<u32> = (0..5)
        .map(|_| results.blocking_recv().map(|m| m.request_id))
        .collect::<Option<_>>()
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);

    handle.shutdown().unwrap();
    assert!(!handle.is_running());
    assert_eq!(handle.process_request(CaptureRequest::default()), Err(AaaError::SessionClosed));
    assert_eq!(handle.shutdown(), Err(AaaError::SessionClosed));
}

#[test]
fn test_worker_teardown_discards_pending() {
    let rig = SimulatedRig::new(SimulatedScene::default());
    let (mut handle, mut results) =
        SessionHandle::spawn(Config::default(), rig.collaborators()).unwrap();
    handle.process_request(CaptureRequest::default()).unwrap();
    handle.shutdown().unwrap();
    // Pending request dropped, channel closed with the worker
    assert!(results.blocking_recv().is_none());
}
