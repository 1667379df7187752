// SPDX-License-Identifier: GPL-3.0-only

//! 3A orchestration core
//!
//! ```text
//! capture pipeline ──events──> worker ──> Session ──> AlgorithmRunner ──> algorithm, sensor, flash
//!                                            │
//!                                            ├──> AE / AF / AWB state machines
//!                                            ├──> FlashSequencer
//!                                            └──> RequestQueue ──metadata──> capture pipeline
//! ```
//!
//! - [`history`]: exposure results by feedback delay
//! - [`frame_sync`]: matching statistics to start-of-frame marks
//! - [`runner`]: one algorithm run per statistics event
//! - [`state`]: AE, AF and AWB state machines
//! - [`requests`]: oldest-first release of result metadata
//! - [`session`]: the per-camera context owning all of the above
//! - [`worker`]: the thread a session runs on

pub mod collaborators;
pub mod frame_sync;
pub mod history;
pub mod requests;
pub mod runner;
pub mod session;
pub mod state;
pub mod types;
pub mod worker;

pub use collaborators::{AiqAlgorithm, Collaborators, FlashUnit, SensorControl, StatisticsSource};
pub use history::ExposureHistory;
pub use runner::AlgorithmRunner;
pub use session::{Session, SessionEvent};
pub use worker::SessionHandle;
