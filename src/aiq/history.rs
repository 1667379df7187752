// SPDX-License-Identifier: GPL-3.0-only

//! Exposure feedback history
//!
//! Fixed-depth ring of past AE results. The sensor applies a new exposure
//! several frames after it is programmed, so the result that is actually
//! active on the sensor is `peek(exposure_delay)`, not the newest one.

use std::collections::VecDeque;

use super::types::ExposureResult;
use crate::constants::history::MIN_HISTORY_DEPTH;

/// Ring buffer of exposure results, newest first on lookup
#[derive(Debug, Clone)]
pub struct ExposureHistory {
    entries: VecDeque<ExposureResult>,
    depth: usize,
}

impl ExposureHistory {
    /// Create a history holding `depth` entries (raised to the minimum of 2)
    pub fn new(depth: usize) -> Self {
        let depth = depth.max(MIN_HISTORY_DEPTH);
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Size the history for a sensor exposure delay.
    ///
    /// A reported delay of 0 means the sensor driver did not set it, in which
    /// case `default_delay` is used.
    pub fn for_exposure_delay(delay_frames: u32, default_delay: u32) -> Self {
        let delay = if delay_frames == 0 {
            default_delay
        } else {
            delay_frames
        };
        Self::new(delay as usize + 1)
    }

    /// Copy `result` in as the newest entry, evicting the oldest when full.
    /// Returns the stored copy.
    pub fn push(&mut self, result: &ExposureResult) -> &ExposureResult {
        if self.entries.len() == self.depth {
            self.entries.pop_back();
        }
        self.entries.push_front(result.clone());
        &self.entries[0]
    }

    /// Result pushed `offset` enqueues ago (0 = newest).
    ///
    /// `None` when fewer than `offset + 1` results have been stored; callers
    /// treat that as "no feedback yet".
    pub fn peek(&self, offset: usize) -> Option<&ExposureResult> {
        self.entries.get(offset)
    }

    /// Overwrite the newest entry in place. Pushes if the history is empty.
    pub fn update_head(&mut self, result: &ExposureResult) {
        match self.entries.front_mut() {
            Some(head) => *head = result.clone(),
            None => {
                self.entries.push_front(result.clone());
            }
        }
    }

    /// Replace the whole history with copies of `result`
    pub fn fill(&mut self, result: &ExposureResult) {
        self.entries.clear();
        self.entries.resize(self.depth, result.clone());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fixed capacity
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
