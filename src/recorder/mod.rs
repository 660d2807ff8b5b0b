//! Recording system module
//!
//! - RecordingStateMachine orchestrating capture, camera and writer
//! - FrameWriter owning the encoder session
//! - Recording states, events and output naming

pub mod events;
pub mod machine;
pub mod output;
pub mod state;
pub mod writer;

pub use events::RecordingEvent;
pub use machine::{RecorderDeps, RecordingStateMachine};
pub use state::{FinalizeOutcome, RecordingOutput, RecordingState};
pub use writer::{FrameWriter, WriterCounts};
