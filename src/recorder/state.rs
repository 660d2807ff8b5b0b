//! Recording state management
//!
//! Defines the recording state machine states and the result of a recording.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current state of the recording system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    #[default]
    Idle,
    /// Acquiring the display, encoder and capture stream
    Starting,
    /// Currently recording
    Recording,
    /// Tearing down the stream and finalizing the file
    Stopping,
    /// A start or stop failed; clears to idle after a short delay
    Errored(String),
}

impl RecordingState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: &RecordingState) -> bool {
        use RecordingState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Recording)
                | (Starting, Errored(_))
                | (Recording, Stopping)
                | (Stopping, Idle)
                | (Stopping, Errored(_))
                | (Errored(_), Idle)
        )
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }

    pub fn error_reason(&self) -> Option<&str> {
        match self {
            RecordingState::Errored(reason) => Some(reason),
            _ => None,
        }
    }
}

/// How the output file was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FinalizeOutcome {
    /// Flushed and closed
    Completed,
    /// Encoder reported failure while flushing; file may be partial
    Failed,
    /// No frame was ever written; the session was abandoned
    Cancelled,
    /// Flush did not finish in time; file may be partial
    TimedOut,
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOutput {
    /// Path to the video file
    pub output_path: PathBuf,

    /// Unix time when recording started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: f64,

    /// Frames written to the encoder
    pub frames_written: u64,

    /// Frames dropped for any reason
    pub frames_dropped: u64,

    pub finalize: FinalizeOutcome,
}
