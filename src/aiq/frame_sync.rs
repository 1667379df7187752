// SPDX-License-Identifier: GPL-3.0-only

//! Start-of-frame tracking and statistics timestamp resolution
//!
//! SOF events are recorded from the interrupt path, outside the worker's
//! serialized queue, so the two retained marks sit behind a mutex. Everything
//! else in the 3A core is owned by the worker and needs no locking.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FrameSyncConfig;

/// One start-of-frame event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSyncMark {
    pub frame_id: u32,
    pub timestamp_us: i64,
}

/// Which timestamp a statistics event was matched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncResolution {
    /// Statistics describe the frame of the latest SOF
    Latest(FrameSyncMark),
    /// Statistics arrived too soon after the latest SOF; they describe the frame before
    Previous(FrameSyncMark),
    /// No usable SOF; the literal statistics timestamp is used
    Lost { stats_timestamp_us: i64 },
}

impl SyncResolution {
    pub fn timestamp_us(&self) -> i64 {
        match self {
            SyncResolution::Latest(mark) | SyncResolution::Previous(mark) => mark.timestamp_us,
            SyncResolution::Lost { stats_timestamp_us } => *stats_timestamp_us,
        }
    }

    pub fn is_lost(&self) -> bool {
        matches!(self, SyncResolution::Lost { .. })
    }
}

/// Pure resolution step. Identical inputs always give the identical result.
pub fn resolve_timestamp(
    current: Option<FrameSyncMark>,
    previous: Option<FrameSyncMark>,
    stats_timestamp_us: i64,
    config: &FrameSyncConfig,
) -> SyncResolution {
    let Some(latest) = current else {
        return SyncResolution::Lost { stats_timestamp_us };
    };

    let delta = stats_timestamp_us.saturating_sub(latest.timestamp_us);
    let candidate = match previous {
        Some(prev) if delta < config.min_delta_us => SyncResolution::Previous(prev),
        _ => SyncResolution::Latest(latest),
    };

    let chosen = candidate.timestamp_us();
    if chosen > stats_timestamp_us
        || stats_timestamp_us.saturating_sub(chosen) > config.max_delta_us
    {
        return SyncResolution::Lost { stats_timestamp_us };
    }
    candidate
}

#[derive(Debug, Default)]
struct SofMarks {
    current: Option<FrameSyncMark>,
    previous: Option<FrameSyncMark>,
}

/// Holds the latest two SOF marks, shared between the SOF path and the worker
#[derive(Debug, Default)]
pub struct FrameSyncTracker {
    marks: Mutex<SofMarks>,
}

impl FrameSyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a start-of-frame; the latest mark becomes the previous one
    pub fn record(&self, mark: FrameSyncMark) {
        let mut marks = self.marks.lock().unwrap_or_else(|e| e.into_inner());
        marks.previous = marks.current.replace(mark);
    }

    /// Forget both marks (stream restart)
    pub fn reset(&self) {
        let mut marks = self.marks.lock().unwrap_or_else(|e| e.into_inner());
        *marks = SofMarks::default();
    }

    /// Current and previous marks
    pub fn marks(&self) -> (Option<FrameSyncMark>, Option<FrameSyncMark>) {
        let marks = self.marks.lock().unwrap_or_else(|e| e.into_inner());
        (marks.current, marks.previous)
    }

    /// Resolve the timestamp a statistics event belongs to
    pub fn resolve(&self, stats_timestamp_us: i64, config: &FrameSyncConfig) -> SyncResolution {
        let (current, previous) = self.marks();
        let resolution = resolve_timestamp(current, previous, stats_timestamp_us, config);
        match resolution {
            SyncResolution::Lost { .. } => {
                warn!(
                    stats_timestamp_us,
                    latest = ?current.map(|m| m.timestamp_us),
                    "Frame sync lost, using statistics timestamp"
                );
            }
            SyncResolution::Previous(mark) => {
                debug!(
                    stats_timestamp_us,
                    sof_us = mark.timestamp_us,
                    frame_id = mark.frame_id,
                    "Statistics matched to previous SOF"
                );
            }
            SyncResolution::Latest(_) => {}
        }
        resolution
    }
}
