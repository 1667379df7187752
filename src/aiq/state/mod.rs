// SPDX-License-Identifier: GPL-3.0-only

//! Externally reported 3A state machines
//!
//! Each machine quantizes algorithm convergence plus user lock/trigger intent
//! into a small state set. They are stepped exactly once per produced frame.

pub mod ae;
pub mod af;
pub mod awb;

pub use ae::{AeInputs, AeState, AeStateMachine};
pub use af::{AfInputs, AfState, AfStateMachine, AfStep};
pub use awb::{AwbInputs, AwbState, AwbStateMachine};
