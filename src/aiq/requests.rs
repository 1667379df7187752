// SPDX-License-Identifier: GPL-3.0-only

//! Pending capture requests
//!
//! Requests are resolved strictly oldest-first: a newer request's metadata is
//! held back until every older one has been released, even if its frame and
//! statistics arrived first.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::types::{CaptureRequest, CaptureSettings, CaptureTriggers, ResultMetadata};
use crate::errors::{AaaError, AaaResult};

/// Lifecycle of a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Queued, settings not applied yet
    New,
    /// Settings applied, waiting for its frame to be evaluated
    Processing,
    /// Metadata assembled, waiting for older requests to be released
    Processed,
}

/// One pending request
#[derive(Debug, Clone)]
pub struct RequestEntry {
    pub request_id: u32,
    /// Exposure the request's frame was captured with, once known
    pub exposure_id: Option<u32>,
    pub state: RequestState,
    pub settings: Option<CaptureSettings>,
    pub triggers: CaptureTriggers,
    metadata: Option<ResultMetadata>,
}

impl RequestEntry {
    pub fn metadata_ready(&self) -> bool {
        self.metadata.is_some()
    }
}

#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<RequestEntry>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a request.
    ///
    /// Returns true when no older request is still unprocessed; the request
    /// starts as PROCESSING and its settings should be applied right away.
    pub fn push(&mut self, request: CaptureRequest) -> bool {
        let apply_now = self
            .entries
            .iter()
            .all(|e| e.state == RequestState::Processed);

        if self.entries.iter().any(|e| e.request_id == request.request_id) {
            warn!(request_id = request.request_id, "Duplicate request id queued");
        }

        let state = if apply_now {
            RequestState::Processing
        } else {
            RequestState::New
        };
        debug!(
            request_id = request.request_id,
            ?state,
            pending = self.entries.len(),
            "Request queued"
        );

        self.entries.push_back(RequestEntry {
            request_id: request.request_id,
            exposure_id: None,
            state,
            settings: request.settings,
            triggers: request.triggers,
            metadata: None,
        });
        apply_now
    }

    /// The request's frame was produced.
    ///
    /// Returns the settings still to be applied (those of a request that was
    /// NEW until now).
    pub fn frame_produced(
        &mut self,
        request_id: u32,
        exposure_id: u32,
    ) -> AaaResult<Option<CaptureSettings>> {
        let entry = self.find_mut(request_id)?;
        entry.exposure_id = Some(exposure_id);
        let pending = match entry.state {
            RequestState::New => {
                entry.state = RequestState::Processing;
                entry.settings.clone()
            }
            _ => None,
        };
        Ok(pending)
    }

    /// Attach assembled metadata; the entry becomes PROCESSED
    pub fn complete(&mut self, request_id: u32, metadata: ResultMetadata) -> AaaResult<()> {
        let entry = self.find_mut(request_id)?;
        if entry.metadata.is_some() {
            debug!(request_id, "Request metadata replaced");
        }
        entry.state = RequestState::Processed;
        entry.metadata = Some(metadata);
        Ok(())
    }

    /// Release metadata from the head of the queue, oldest first, stopping at
    /// the first request that is not ready.
    pub fn drain_ready(&mut self) -> Vec<ResultMetadata> {
        let mut ready = Vec::new();
        while self
            .entries
            .front()
            .is_some_and(|e| e.state == RequestState::Processed)
        {
            if let Some(metadata) = self.entries.pop_front().and_then(|e| e.metadata) {
                ready.push(metadata);
            }
        }
        ready
    }

    pub fn get(&self, request_id: u32) -> Option<&RequestEntry> {
        self.entries.iter().find(|e| e.request_id == request_id)
    }

    /// Position in the queue (0 = oldest)
    pub fn position(&self, request_id: u32) -> Option<usize> {
        self.entries.iter().position(|e| e.request_id == request_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard every pending request
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    fn find_mut(&mut self, request_id: u32) -> AaaResult<&mut RequestEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.request_id == request_id)
            .ok_or_else(|| AaaError::OutOfRange(format!("request {} is not pending", request_id)))
    }
}
