//! Recording events
//!
//! Broadcast to any number of listeners (menu bar, overlays, logs). Slow
//! listeners lag and miss events; the recorder never waits on them.

use super::state::{RecordingOutput, RecordingState};
use std::path::PathBuf;

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// The state machine moved to a new state
    StateChanged(RecordingState),
    /// Recording started writing to `output`
    Started { output: PathBuf },
    /// Recording stopped
    Stopped(RecordingOutput),
    /// Error occurred
    Error(String),
}

/// Capacity of the event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 100;
