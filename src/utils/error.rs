//! Error types and handling
//!
//! Common error types used across the recorder.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Recorder-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("No display available for capture")]
    NoDisplayFound,

    #[error("Encoder setup failed: {0}")]
    EncoderSetupFailed(String),

    #[error("Capture stream failed to start: {0}")]
    StreamStartFailed(String),

    #[error("Capture stream failed to stop: {0}")]
    StreamStopFailed(String),

    #[error("Failed to append frame: {0}")]
    WriterAppendFailed(String),

    #[error("Writer did not finish within {0:?}")]
    FinalizeTimeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecorderError {
    /// Whether this error escalates to the state machine.
    ///
    /// Per-frame append failures and finalize timeouts are logged and
    /// swallowed; everything else tears the recording down.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            RecorderError::WriterAppendFailed(_) | RecorderError::FinalizeTimeout(_)
        )
    }

    /// Stable machine-readable code for the UI layer
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::NoDisplayFound => "NO_DISPLAY_FOUND",
            RecorderError::EncoderSetupFailed(_) => "ENCODER_SETUP_FAILED",
            RecorderError::StreamStartFailed(_) => "STREAM_START_FAILED",
            RecorderError::StreamStopFailed(_) => "STREAM_STOP_FAILED",
            RecorderError::WriterAppendFailed(_) => "WRITER_APPEND_FAILED",
            RecorderError::FinalizeTimeout(_) => "FINALIZE_TIMEOUT",
            RecorderError::Configuration(_) => "CONFIGURATION_ERROR",
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Error response for the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&RecorderError> for ErrorResponse {
    fn from(error: &RecorderError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<RecorderError> for ErrorResponse {
    fn from(error: RecorderError) -> Self {
        ErrorResponse::from(&error)
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;
