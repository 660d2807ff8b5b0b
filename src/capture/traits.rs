//! Capture trait definitions
//!
//! Narrow capability interfaces over the platform screen-capture API. The
//! platform implementation enumerates displays, runs a stream that delivers
//! frames to a [`FrameSink`], and accepts source-rectangle updates while the
//! stream is live.

use super::geometry::{Rect, Size};
use crate::utils::RecorderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Information about a display/screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    /// Unique display ID
    pub id: u32,

    /// Display name
    pub name: String,

    /// Width in points
    pub width: u32,

    /// Height in points
    pub height: u32,

    /// Scale factor (e.g., 2.0 for Retina)
    pub scale_factor: f64,

    /// Whether this is the primary display
    pub is_primary: bool,

    /// Refresh rate in Hz (if available)
    pub refresh_rate: Option<u32>,
}

impl DisplayInfo {
    /// Display size in points
    pub fn size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// Pick the display to record: the requested id, else the primary, else the first.
    pub fn select(displays: &[DisplayInfo], requested: Option<u32>) -> Option<&DisplayInfo> {
        if let Some(id) = requested {
            if let Some(display) = displays.iter().find(|d| d.id == id) {
                return Some(display);
            }
            tracing::warn!("Display {} not found, falling back to primary", id);
        }
        displays
            .iter()
            .find(|d| d.is_primary)
            .or_else(|| displays.first())
    }
}

/// Frame data delivered by a capture stream
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Raw pixel data (BGRA format)
    pub data: Vec<u8>,

    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Bytes per row (may include padding)
    pub bytes_per_row: u32,

    /// Presentation timestamp on the capture clock
    pub timestamp: Duration,
}

/// Receiver of captured frames.
///
/// Called from the capture source's own delivery context, so implementations
/// must be thread-safe and must not reorder frames.
pub trait FrameSink: Send + Sync {
    fn submit_frame(&self, frame: CapturedFrame);
}

/// Parameters for starting a capture stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Display to capture
    pub display: DisplayInfo,

    /// Output frame width in pixels
    pub pixel_width: u32,

    /// Output frame height in pixels
    pub pixel_height: u32,

    /// Minimum interval between frames
    pub frame_interval: Duration,

    /// Initial source rectangle, in capture space
    pub source_rect: Rect,
}

/// Platform screen-capture source
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Enumerate the displays available for capture
    async fn displays(&self) -> RecorderResult<Vec<DisplayInfo>>;

    /// Start a stream delivering frames to `sink`
    async fn start_stream(
        &self,
        config: StreamConfig,
        sink: Arc<dyn FrameSink>,
    ) -> RecorderResult<Box<dyn CaptureStream>>;
}

/// A live capture stream
#[async_trait]
pub trait CaptureStream: Send + Sync {
    /// Reconfigure the source rectangle. Fire-and-forget.
    fn update_region(&self, source_rect: Rect);

    /// Stop the stream and wait for the platform teardown
    async fn stop(&self) -> RecorderResult<()>;
}
