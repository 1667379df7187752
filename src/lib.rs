// SPDX-License-Identifier: GPL-3.0-only

//! camera3a - 3A orchestration core for camera pipelines
//!
//! Runs the auto-exposure, auto-focus and auto-white-balance algorithms once
//! per statistics event, keeps the per-request AE/AF/AWB state machines and
//! the pre-flash sequence in step with produced frames, and releases result
//! metadata to the capture pipeline strictly in request order.
//!
//! # Architecture
//!
//! - [`aiq`]: the 3A core (history, frame sync, runner, state machines,
//!   request queue, session and worker)
//! - [`flash`]: flash modes, the pre-flash sequencer and the sysfs LED unit
//! - [`backends`]: collaborator implementations
//! - [`config`]: tunable thresholds
//!
//! # Example
//!
//! ```ignore
//! let rig = SimulatedRig::new(SimulatedScene::default());
//! let (mut handle, mut results) = SessionHandle::spawn(Config::default(), rig.collaborators())?;
//! handle.process_request(CaptureRequest::default())?;
//! ```

pub mod aiq;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod flash;

// Re-export commonly used types
pub use aiq::types::{CaptureRequest, CaptureSettings, FrameEvent, ResultMetadata, StatisticsEvent};
pub use aiq::{Session, SessionEvent, SessionHandle};
pub use config::Config;
pub use errors::{AaaError, AaaResult, FlashError};
pub use flash::FlashMode;
