// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Running a scripted session against the simulated camera
//! - Printing the effective configuration

use std::io::Write;
use std::path::PathBuf;

use camera3a::aiq::types::{CaptureTriggers, PrecaptureTrigger};
use camera3a::backends::simulated::{SimulatedRig, SimulatedScene};
use camera3a::flash::FlashBank;
use camera3a::flash::sysfs::SysfsFlash;
use camera3a::{
    CaptureRequest, CaptureSettings, Config, FlashMode, FrameEvent, SessionHandle, StatisticsEvent,
};

/// Frame period of the simulated sensor (microseconds)
const FRAME_PERIOD_US: i64 = 33_333;
/// Statistics arrive this long after start-of-frame
const STATISTICS_LATENCY_US: i64 = 25_000;

/// Options for `camera3a simulate`
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub frames: u32,
    pub exposure_delay: u32,
    pub precapture_at: Option<u32>,
    pub dark: bool,
    pub flash_fails: bool,
    pub flash_mode: FlashMode,
    /// LED class directory whose flash LEDs follow the simulated flash
    pub leds: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Run a scripted session and print one JSON line per result
pub fn simulate(options: SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default(options.config.as_deref())?;
    let rig = SimulatedRig::new(SimulatedScene {
        dark: options.dark,
        flash_fails: options.flash_fails,
        exposure_delay: options.exposure_delay,
        ..Default::default()
    });

    let mut collaborators = rig.collaborators();
    if let Some(dir) = options.leds.as_deref() {
        let leds = SysfsFlash::discover_in(dir);
        if leds.is_empty() {
            eprintln!("No usable flash LEDs in {}", dir.display());
        }
        let mut bank = FlashBank::new();
        // The simulated unit stays first: it produces the flash-exposed frames
        if let Some(simulated) = collaborators.flash.take() {
            bank.push(simulated);
        }
        for led in leds {
            eprintln!("Driving flash LED {}", led.name());
            bank.push(Box::new(led));
        }
        collaborators.flash = Some(Box::new(bank));
    }

    let (mut handle, mut results) = SessionHandle::spawn(config, collaborators)?;
    let rt = tokio::runtime::Runtime::new()?;
    let settings = CaptureSettings {
        flash_mode: options.flash_mode,
        ..Default::default()
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut precapture_running = false;

    for frame in 1..=options.frames {
        let triggers = if options.precapture_at == Some(frame) {
            precapture_running = true;
            CaptureTriggers {
                precapture: PrecaptureTrigger::Start,
                precapture_id: frame as i32,
                ..Default::default()
            }
        } else {
            CaptureTriggers::default()
        };
        handle.process_request(CaptureRequest {
            request_id: frame,
            settings: Some(settings.clone()),
            triggers,
        })?;

        let sof_us = frame as i64 * FRAME_PERIOD_US;
        handle.notify_sof(frame, sof_us)?;
        handle.notify_frame_produced(FrameEvent {
            request_id: frame,
            exposure_id: frame,
            timestamp_us: sof_us,
            status: rig.next_frame_status(),
        })?;
        handle.notify_statistics_ready(StatisticsEvent {
            frame_id: frame,
            timestamp_us: sof_us + STATISTICS_LATENCY_US,
        })?;

        // One result per frame: the request was evaluated once it arrives
        let Some(metadata) = rt.block_on(results.recv()) else {
            return Err("3A worker stopped before the script finished".into());
        };
        writeln!(out, "{}", serde_json::to_string(&metadata)?)?;

        // Take the still once the sequence is done and leave it
        if precapture_running
            && !metadata.ae_precapture_active
            && frame > options.precapture_at.unwrap_or(0)
        {
            handle.exit_flash_sequence()?;
            precapture_running = false;
        }
    }

    handle.shutdown()?;
    Ok(())
}

/// Print the effective configuration
pub fn show_config(path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default(path.as_deref())?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    if path.is_none() {
        if let Some(default) = Config::default_path() {
            eprintln!("Config file: {}", default.display());
        }
    }
    Ok(())
}
