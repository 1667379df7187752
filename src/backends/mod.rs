// SPDX-License-Identifier: GPL-3.0-only

//! Collaborator implementations
//!
//! - [`simulated`]: deterministic scripted camera for the CLI and tests
//!
//! The flash LED backend lives in [`crate::flash::sysfs`].

pub mod simulated;
