// SPDX-License-Identifier: GPL-3.0-only

//! Result metadata ordering across interleaved frame and statistics events

use std::sync::Arc;

use camera3a::aiq::frame_sync::FrameSyncTracker;
use camera3a::aiq::types::FrameStatus;
use camera3a::backends::simulated::{SimulatedRig, SimulatedScene};
use camera3a::{CaptureRequest, Config, FrameEvent, Session, SessionEvent, StatisticsEvent};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Arrival {
    Frame(u32),
    Statistics(u32),
}

fn event(arrival: Arrival) -> SessionEvent {
    match arrival {
        Arrival::Frame(id) => SessionEvent::FrameProduced(FrameEvent {
            request_id: id,
            exposure_id: id,
            timestamp_us: id as i64 * 33_333,
            status: FrameStatus::Ok,
        }),
        Arrival::Statistics(id) => SessionEvent::StatisticsReady(StatisticsEvent {
            frame_id: id,
            timestamp_us: id as i64 * 33_333 + 25_000,
        }),
    }
}

fn arrivals() -> impl Strategy<Value = Vec<Arrival>> {
    (2u32..=4).prop_flat_map(|count| {
        let all: Vec<Arrival> = (1..=count)
            .flat_map(|id| [Arrival::Frame(id), Arrival::Statistics(id)])
            .collect();
        Just(all).prop_shuffle()
    })
}

fn run(arrivals: &[Arrival]) -> (Vec<Vec<u32>>, usize) {
    let rig = SimulatedRig::new(SimulatedScene::default());
    let mut session = Session::new(
        Config::default(),
        rig.collaborators(),
        Arc::new(FrameSyncTracker::new()),
    );
    let count = arrivals.len() / 2;
    for id in 1..=count as u32 {
        session
            .handle(SessionEvent::Request(CaptureRequest {
                request_id: id,
                ..Default::default()
            }))
            .unwrap();
    }

    let mut emitted = Vec::new();
    for &arrival in arrivals {
        session.handle(event(arrival)).unwrap();
        emitted.push(session.take_results().iter().map(|m| m.request_id).collect());
    }
    (emitted, count)
}

#[test]
fn test_newer_statistics_first_still_releases_older_first() {
    let (emitted, _) = run(&[
        Arrival::Frame(2),
        Arrival::Statistics(2),
        Arrival::Frame(1),
        Arrival::Statistics(1),
    ]);
    // Request 2 was evaluated first but waits for request 1
    assert_eq!(emitted, vec![vec![], vec![], vec![1, 2], vec![]]);
}

proptest! {
    #[test]
    fn test_metadata_released_oldest_first(arrivals in arrivals()) {
        let (emitted, count) = run(&arrivals);
        let flat: Vec<u32> = emitted.into_iter().flatten().collect();
        let expected: Vec<u32> = (1..=count as u32).collect();
        prop_assert_eq!(flat, expected);
    }
}
