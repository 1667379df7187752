// SPDX-License-Identifier: GPL-3.0-only

//! Session worker thread
//!
//! Each camera session runs on one dedicated thread that owns the [`Session`]
//! and consumes events strictly in arrival order. Callers talk to it through
//! a [`SessionHandle`]; result metadata comes back over a tokio channel so
//! async pipelines can await it.
//!
//! Queued events are drained in bounded batches. Statistics events that pile
//! up behind a slow run are coalesced: only the newest one of a batch is
//! acted on.
//!
//! Start-of-frame marks bypass the queue and are recorded directly on the
//! shared [`FrameSyncTracker`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc as tokio_mpsc;
use tracing::{debug, info, warn};

use super::collaborators::Collaborators;
use super::frame_sync::{FrameSyncMark, FrameSyncTracker};
use super::session::{Session, SessionEvent};
use super::types::{CaptureRequest, FrameEvent, ResultMetadata, StatisticsEvent};
use crate::config::Config;
use crate::constants::worker::{MAX_BATCH_EVENTS, THREAD_NAME};
use crate::errors::{AaaError, AaaResult};

#[derive(Debug)]
enum WorkerMessage {
    Event(SessionEvent),
    Shutdown,
}

/// Handle to a running session worker
pub struct SessionHandle {
    sender: Option<mpsc::Sender<WorkerMessage>>,
    thread_handle: Option<JoinHandle<()>>,
    frame_sync: Arc<FrameSyncTracker>,
    running: Arc<AtomicBool>,
}

impl SessionHandle {
    /// Spawn the worker. Returns the handle and the receiver for result metadata.
    pub fn spawn(
        config: Config,
        collaborators: Collaborators,
    ) -> AaaResult<(Self, tokio_mpsc::UnboundedReceiver<ResultMetadata>)> {
        let frame_sync = Arc::new(FrameSyncTracker::new());
        let (sender, receiver) = mpsc::channel::<WorkerMessage>();
        let (result_tx, result_rx) = tokio_mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));

        let session = Session::new(config, collaborators, Arc::clone(&frame_sync));
        let running_clone = Arc::clone(&running);

        let thread_handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                run_worker(session, receiver, result_tx);
                running_clone.store(false, Ordering::SeqCst);
            })
            .map_err(|e| AaaError::Io(format!("failed to spawn 3A worker: {}", e)))?;

        info!(thread = THREAD_NAME, "3A worker started");

        Ok((
            Self {
                sender: Some(sender),
                thread_handle: Some(thread_handle),
                frame_sync,
                running,
            },
            result_rx,
        ))
    }

    pub fn process_request(&self, request: CaptureRequest) -> AaaResult<()> {
        self.send(SessionEvent::Request(request))
    }

    pub fn notify_frame_produced(&self, frame: FrameEvent) -> AaaResult<()> {
        self.send(SessionEvent::FrameProduced(frame))
    }

    pub fn notify_statistics_ready(&self, stats: StatisticsEvent) -> AaaResult<()> {
        self.send(SessionEvent::StatisticsReady(stats))
    }

    pub fn notify_metadata_requestable(&self, request_id: u32) -> AaaResult<()> {
        self.send(SessionEvent::MetadataRequestable(request_id))
    }

    /// Record a start-of-frame mark. Runs on the caller's thread.
    pub fn notify_sof(&self, frame_id: u32, timestamp_us: i64) -> AaaResult<()> {
        if !self.is_running() {
            return Err(AaaError::SessionClosed);
        }
        self.frame_sync.record(FrameSyncMark {
            frame_id,
            timestamp_us,
        });
        Ok(())
    }

    pub fn exit_flash_sequence(&self) -> AaaResult<()> {
        self.send(SessionEvent::ExitFlashSequence)
    }

    pub fn reconfigure(&self, exposure_delay_frames: u32) -> AaaResult<()> {
        self.send(SessionEvent::Reconfigure {
            exposure_delay_frames,
        })
    }

    pub fn set_low_power_mode(&self, enabled: bool) -> AaaResult<()> {
        self.send(SessionEvent::LowPowerMode(enabled))
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Tear the session down and wait for the worker to exit.
    ///
    /// The event being handled finishes first; everything still queued
    /// behind the shutdown is discarded.
    pub fn shutdown(&mut self) -> AaaResult<()> {
        let Some(sender) = self.sender.take() else {
            return Err(AaaError::SessionClosed);
        };
        // A send error means the worker is already gone; joining still reaps it
        let _ = sender.send(WorkerMessage::Shutdown);
        drop(sender);

        if let Some(handle) = self.thread_handle.take() {
            debug!("Waiting for 3A worker to finish");
            if let Err(e) = handle.join() {
                warn!("3A worker thread panicked: {:?}", e);
            }
        }
        info!("3A worker stopped");
        Ok(())
    }

    fn send(&self, event: SessionEvent) -> AaaResult<()> {
        let sender = self.sender.as_ref().ok_or(AaaError::SessionClosed)?;
        sender
            .send(WorkerMessage::Event(event))
            .map_err(|_| AaaError::SessionClosed)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.sender.is_some() {
            debug!("SessionHandle dropped, shutting down worker");
            let _ = self.shutdown();
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn run_worker(
    mut session: Session,
    receiver: mpsc::Receiver<WorkerMessage>,
    results: tokio_mpsc::UnboundedSender<ResultMetadata>,
) {
    debug!("3A worker loop started");

    while let Ok(first) = receiver.recv() {
        let (batch, shutdown) = drain_batch(first, &receiver, MAX_BATCH_EVENTS);

        for event in coalesce_statistics(batch) {
            if let Err(e) = session.handle(event) {
                warn!(error = %e, "3A event failed");
            }
            for metadata in session.take_results() {
                if results.send(metadata).is_err() {
                    debug!("Result receiver dropped");
                }
            }
        }

        if shutdown {
            break;
        }
    }

    session.teardown();
    debug!("3A worker loop exiting");
}

/// Collect `first` and whatever is already queued, up to `limit` events.
/// Returns the events and whether a shutdown was seen.
fn drain_batch(
    first: WorkerMessage,
    receiver: &mpsc::Receiver<WorkerMessage>,
    limit: usize,
) -> (Vec<SessionEvent>, bool) {
    let mut batch = Vec::new();
    let mut message = first;
    loop {
        match message {
            WorkerMessage::Event(event) => batch.push(event),
            WorkerMessage::Shutdown => return (batch, true),
        }
        if batch.len() >= limit {
            break;
        }
        match receiver.try_recv() {
            Ok(next) => message = next,
            Err(_) => break,
        }
    }
    (batch, false)
}

/// Keep only the newest statistics event of a drained batch, at its own
/// position. Every other event keeps its order.
pub(crate) fn coalesce_statistics(batch: Vec<SessionEvent>) -> Vec<SessionEvent> {
    let newest = batch
        .iter()
        .rposition(|e| matches!(e, SessionEvent::StatisticsReady(_)));
    let Some(newest) = newest else {
        return batch;
    };

    let dropped = batch[..newest]
        .iter()
        .filter(|e| matches!(e, SessionEvent::StatisticsReady(_)))
        .count();
    if dropped > 0 {
        debug!(dropped, "Coalesced statistics backlog to newest");
    }

    batch
        .into_iter()
        .enumerate()
        .filter(|(i, e)| *i == newest || !matches!(e, SessionEvent::StatisticsReady(_)))
        .map(|(_, e)| e)
        .collect()
}
