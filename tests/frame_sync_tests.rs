// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for start-of-frame matching

use camera3a::aiq::frame_sync::{FrameSyncMark, FrameSyncTracker, SyncResolution, resolve_timestamp};
use camera3a::config::FrameSyncConfig;
use proptest::prelude::*;

#[test]
fn test_statistics_right_after_sof_use_previous_frame() {
    let tracker = FrameSyncTracker::new();
    tracker.record(FrameSyncMark {
        frame_id: 1,
        timestamp_us: 80_000,
    });
    tracker.record(FrameSyncMark {
        frame_id: 2,
        timestamp_us: 100_000,
    });
    let resolved = tracker.resolve(105_000, &FrameSyncConfig::default());
    assert_eq!(resolved.timestamp_us(), 80_000);
}

#[test]
fn test_no_sof_is_lost() {
    let tracker = FrameSyncTracker::new();
    let resolved = tracker.resolve(105_000, &FrameSyncConfig::default());
    assert_eq!(resolved, SyncResolution::Lost { stats_timestamp_us: 105_000 });
}

#[test]
fn test_thresholds_are_configurable() {
    let config = FrameSyncConfig {
        min_delta_us: 1_000,
        max_delta_us: 200_000,
    };
    let latest = FrameSyncMark {
        frame_id: 2,
        timestamp_us: 100_000,
    };
    let previous = FrameSyncMark {
        frame_id: 1,
        timestamp_us: 80_000,
    };
    let resolved = resolve_timestamp(Some(latest), Some(previous), 105_000, &config);
    assert_eq!(resolved, SyncResolution::Latest(latest));
}

#[test]
fn test_extreme_timestamps_are_lost() {
    let config = FrameSyncConfig::default();
    let latest = FrameSyncMark {
        frame_id: 2,
        timestamp_us: i64::MIN,
    };
    let previous = FrameSyncMark {
        frame_id: 1,
        timestamp_us: i64::MIN,
    };
    let resolved = resolve_timestamp(Some(latest), Some(previous), i64::MAX, &config);
    assert_eq!(
        resolved,
        SyncResolution::Lost {
            stats_timestamp_us: i64::MAX
        }
    );

    let future = FrameSyncMark {
        frame_id: 3,
        timestamp_us: i64::MAX,
    };
    let resolved = resolve_timestamp(Some(future), None, i64::MIN, &config);
    assert_eq!(
        resolved,
        SyncResolution::Lost {
            stats_timestamp_us: i64::MIN
        }
    );
}

proptest! {
    #[test]
    fn test_resolution_is_idempotent(
        prev in 0i64..1_000_000,
        gap in 0i64..100_000,
        arrival in 0i64..300_000,
    ) {
        let tracker = FrameSyncTracker::new();
        tracker.record(FrameSyncMark { frame_id: 1, timestamp_us: prev });
        tracker.record(FrameSyncMark { frame_id: 2, timestamp_us: prev + gap });
        let config = FrameSyncConfig::default();
        let stats_ts = prev + arrival;
        let first = tracker.resolve(stats_ts, &config);
        let second = tracker.resolve(stats_ts, &config);
        prop_assert_eq!(first, second);
        // The chosen timestamp never lies after the statistics
        prop_assert!(first.timestamp_us() <= stats_ts);
    }
}
