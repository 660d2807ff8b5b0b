//! Screen capture plumbing
//!
//! Geometry and coordinate conversion, the platform capture capability
//! traits, and the session that drives a live stream.

pub mod geometry;
pub mod session;
pub mod synthetic;
pub mod traits;

pub use geometry::{CaptureRegion, Point, Rect, Selection, Size};
pub use session::{CaptureSession, RegionThrottle};
pub use synthetic::SyntheticCaptureSource;
pub use traits::{CaptureSource, CaptureStream, CapturedFrame, DisplayInfo, FrameSink, StreamConfig};
