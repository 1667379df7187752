// SPDX-License-Identifier: GPL-3.0-only

//! 3A tuning constants
//!
//! Defaults for the values exposed through [`crate::config::Config`]. The
//! timing thresholds are empirical and kept overridable.

/// Frame sync resolution between start-of-frame marks and statistics events
pub mod frame_sync {
    /// Minimum latency from start-of-frame to statistics ready (microseconds).
    /// Statistics arriving sooner than this after the latest SOF belong to the
    /// frame before it.
    pub const MIN_SYNC_DELTA_US: i64 = 20_000;

    /// Oldest start-of-frame mark accepted for a statistics event (microseconds)
    pub const MAX_SYNC_DELTA_US: i64 = 200_000;
}

/// Exposure feedback history
pub mod history {
    /// Exposure delay assumed when the sensor reports 0 (meaning "not set")
    pub const DEFAULT_AE_DELAY_FRAMES: u32 = 2;

    /// Smallest history: the current result plus one delayed entry
    pub const MIN_HISTORY_DEPTH: usize = 2;
}

/// Algorithm convergence policy
pub mod convergence {
    /// Statistics cycles after invalidation before AE "converged" is trusted.
    /// The algorithm reports a false convergence on the first frames after
    /// stream start.
    pub const MIN_FRAMES_AE_CONVERGED: u32 = 6;

    /// AWB counts as converged below this distance
    pub const AWB_CONVERGED_DISTANCE: f32 = 0.001;
}

/// Pre-flash sequence timing
pub mod flash {
    /// Frames skipped between sequence stages so the sensor picks up and
    /// applies the new exposure
    pub const SKIP_FRAMES: u32 = 2;

    /// Frames to wait for a flash-exposed frame after firing
    pub const FRAME_TIMEOUT: u32 = 5;

    /// Frames after a flash-exposed frame still reported as fired
    pub const EXPOSED_HOLD_FRAMES: u32 = 2;

    /// Number of flash LEDs carried in an exposure result
    pub const NUM_FLASH_LEDS: usize = 1;

    /// Pulse count used for the pre-flash
    pub const PRE_FLASH_PULSES: u32 = 1;
}

/// Worker thread
pub mod worker {
    /// Name of the 3A worker thread
    pub const THREAD_NAME: &str = "camera3a-worker";
    /// Most events drained from the queue before handling them
    pub const MAX_BATCH_EVENTS: usize = 64;
}

/// Application metadata
pub mod app_info {
    /// Directory name under the user config dir
    pub const CONFIG_DIR_NAME: &str = "camera3a";

    /// Config file name
    pub const CONFIG_FILE_NAME: &str = "config.json";
}
