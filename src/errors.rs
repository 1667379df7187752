// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the 3A core
//!
//! Every error in this crate is locally recoverable: handlers return them so the
//! caller can log, but the worker loop never stops on one.

use std::fmt;

use crate::aiq::types::FrameStatus;

/// Result type alias using AaaError
pub type AaaResult<T> = Result<T, AaaError>;

/// Main 3A error type
#[derive(Debug, Clone, PartialEq)]
pub enum AaaError {
    /// Algorithm or sensor handle not initialized; skip the cycle
    NotReady(String),
    /// A lookup fell outside the available range (history depth, frame sync window)
    OutOfRange(String),
    /// Pre-flash metering sequence aborted
    FlashSequence(FlashError),
    /// Sensor register programming failed
    Sensor(String),
    /// Algorithm entry point reported a failure
    Algorithm(String),
    /// Configuration errors
    Config(String),
    /// Filesystem errors (config files, sysfs)
    Io(String),
    /// The session worker has been torn down
    SessionClosed,
}

/// Flash sequence failures
#[derive(Debug, Clone, PartialEq)]
pub enum FlashError {
    /// No exposed frame within the frame budget
    Timeout { frames: u32 },
    /// A frame came back flagged as flash failed (or otherwise unusable)
    FrameStatus(FrameStatus),
    /// Flash unit rejected a command
    Hardware(String),
}

impl AaaError {
    /// Whether the session can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, AaaError::SessionClosed)
    }
}

impl fmt::Display for AaaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AaaError::NotReady(msg) => write!(f, "3A not ready: {}", msg),
            AaaError::OutOfRange(msg) => write!(f, "Out of range: {}", msg),
            AaaError::FlashSequence(e) => write!(f, "Flash sequence failed: {}", e),
            AaaError::Sensor(msg) => write!(f, "Sensor error: {}", msg),
            AaaError::Algorithm(msg) => write!(f, "Algorithm error: {}", msg),
            AaaError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AaaError::Io(msg) => write!(f, "I/O error: {}", msg),
            AaaError::SessionClosed => write!(f, "3A session closed"),
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::Timeout { frames } => {
                write!(f, "no flash-exposed frame after {} frames", frames)
            }
            FlashError::FrameStatus(status) => write!(f, "frame flagged {:?}", status),
            FlashError::Hardware(msg) => write!(f, "flash hardware: {}", msg),
        }
    }
}

impl std::error::Error for AaaError {}
impl std::error::Error for FlashError {}

impl From<FlashError> for AaaError {
    fn from(err: FlashError) -> Self {
        AaaError::FlashSequence(err)
    }
}

impl From<std::io::Error> for AaaError {
    fn from(err: std::io::Error) -> Self {
        AaaError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AaaError {
    fn from(err: serde_json::Error) -> Self {
        AaaError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_closed_session_is_unrecoverable() {
        assert!(AaaError::NotReady("handle".into()).is_recoverable());
        assert!(AaaError::FlashSequence(FlashError::Timeout { frames: 5 }).is_recoverable());
        assert!(!AaaError::SessionClosed.is_recoverable());
    }

    #[test]
    fn test_flash_error_display() {
        let err: AaaError = FlashError::Timeout { frames: 5 }.into();
        assert_eq!(
            err.to_string(),
            "Flash sequence failed: no flash-exposed frame after 5 frames"
        );
    }
}
