// SPDX-License-Identifier: GPL-3.0-only

//! Several flash units driven as one
//!
//! Phones commonly carry more than one flash LED (white and yellow). A
//! [`FlashBank`] forwards every command to all of its units.

use tracing::warn;

use crate::aiq::collaborators::FlashUnit;
use crate::errors::AaaResult;

/// Flash units that are programmed and fired together
#[derive(Default)]
pub struct FlashBank {
    units: Vec<Box<dyn FlashUnit>>,
}

impl FlashBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: Box<dyn FlashUnit>) {
        self.units.push(unit);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Run `command` on every unit. All units are attempted; the first
    /// error is returned.
    fn for_each(
        &mut self,
        command: &str,
        mut f: impl FnMut(&mut Box<dyn FlashUnit>) -> AaaResult<()>,
    ) -> AaaResult<()> {
        let mut status = Ok(());
        for (index, unit) in self.units.iter_mut().enumerate() {
            if let Err(e) = f(unit) {
                warn!(unit = index, command, error = %e, "Flash unit failed");
                if status.is_ok() {
                    status = Err(e);
                }
            }
        }
        status
    }
}

impl FlashUnit for FlashBank {
    fn set_intensity(&mut self, power_percent: f32) -> AaaResult<()> {
        self.for_each("set_intensity", |unit| unit.set_intensity(power_percent))
    }

    fn fire(&mut self, frames: u32) -> AaaResult<()> {
        self.for_each("fire", |unit| unit.fire(frames))
    }
}

impl std::fmt::Debug for FlashBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlashBank")
            .field("units", &self.units.len())
            .finish()
    }
}
