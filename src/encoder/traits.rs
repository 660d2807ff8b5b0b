//! Encoder sink trait definitions
//!
//! Capability interface over an incremental video-file encoder. A session is
//! created per recording, starts writing immediately, starts its timeline at
//! the first frame, and is either finished (flushed) or cancelled.

use crate::capture::CapturedFrame;
use crate::utils::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Encoder session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EncoderStatus {
    NotStarted,
    Writing,
    Completed,
    Failed,
    Cancelled,
}

impl EncoderStatus {
    /// Whether the session will never accept another frame
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EncoderStatus::Completed | EncoderStatus::Failed | EncoderStatus::Cancelled
        )
    }
}

/// Video codec selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
}

impl VideoCodec {
    /// FFmpeg encoder name
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::Hevc => "libx265",
        }
    }
}

/// Codec configuration for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodecConfig {
    pub codec: VideoCodec,
    /// Even width in pixels
    pub width: u32,
    /// Even height in pixels
    pub height: u32,
    /// Bits per second
    pub bitrate: u64,
    /// Frames between keyframes
    pub keyframe_interval: u32,
    pub frame_rate: u32,
}

/// Round a dimension down to an even number (minimum 2).
///
/// 4:2:0 chroma subsampling needs even frame sizes.
pub fn even_dimension(value: u32) -> u32 {
    (value & !1).max(2)
}

/// Tightly packed BGRA frame with the session's exact dimensions
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl PixelBuffer {
    /// Copy the top-left `width` x `height` pixels of `frame`, dropping row padding
    pub fn from_frame(frame: &CapturedFrame, width: u32, height: u32) -> RecorderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RecorderError::WriterAppendFailed(
                "output size must not be empty".to_string(),
            ));
        }
        if frame.width < width || frame.height < height {
            return Err(RecorderError::WriterAppendFailed(format!(
                "frame {}x{} is smaller than the {}x{} output",
                frame.width, frame.height, width, height
            )));
        }

        let stride = frame.bytes_per_row as usize;
        let row_bytes = width as usize * 4;
        let needed = stride * (height as usize - 1) + row_bytes;
        if stride < row_bytes || frame.data.len() < needed {
            return Err(RecorderError::WriterAppendFailed(format!(
                "frame buffer of {} bytes (stride {}) is too short",
                frame.data.len(),
                stride
            )));
        }

        if stride == row_bytes && frame.width == width {
            return Ok(Self {
                data: frame.data[..row_bytes * height as usize].to_vec(),
                width,
                height,
            });
        }

        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in frame.data.chunks(stride).take(height as usize) {
            data.extend_from_slice(&row[..row_bytes]);
        }
        Ok(Self { data, width, height })
    }
}

/// Completion callback for [`EncoderSession::finish`]
pub type FinishCallback = Box<dyn FnOnce(EncoderStatus) + Send + 'static>;

/// Factory for encoder sessions
pub trait VideoEncoder: Send + Sync {
    /// Create a session writing to `output`
    fn create_session(
        &self,
        config: &CodecConfig,
        output: &Path,
    ) -> RecorderResult<Box<dyn EncoderSession>>;
}

/// One encoder-backed output file
pub trait EncoderSession: Send {
    /// Open the output and begin accepting input
    fn start_writing(&mut self) -> RecorderResult<()>;

    /// Start the timeline; later timestamps are relative to `at`
    fn start_session(&mut self, at: Duration);

    fn is_ready_for_more_data(&self) -> bool;

    /// Append one frame at `timestamp` (relative to the session start)
    fn append(&mut self, buffer: PixelBuffer, timestamp: Duration) -> RecorderResult<()>;

    /// No more input will follow
    fn mark_finished(&mut self);

    /// Flush and close the file, reporting the final status through `done`
    fn finish(&mut self, done: FinishCallback);

    /// Abandon the output
    fn cancel(&mut self);

    fn status(&self) -> EncoderStatus;

    /// Detail for the most recent encoder failure
    fn last_error(&self) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_dimension() {
        assert_eq!(even_dimension(1920), 1920);
        assert_eq!(even_dimension(1081), 1080);
        assert_eq!(even_dimension(1), 2);
    }

    #[test]
    fn test_pixel_buffer_strips_padding_and_crops() {
        // 3x2 frame with 4 bytes of padding per row
        let mut data = Vec::new();
        for row in 0..2u8 {
            for col in 0..3u8 {
                data.extend_from_slice(&[row, col, 0, 255]);
            }
            data.extend_from_slice(&[9, 9, 9, 9]);
        }
        let frame = CapturedFrame {
            data,
            width: 3,
            height: 2,
            bytes_per_row: 16,
            timestamp: Duration::ZERO,
        };

        let buffer = PixelBuffer::from_frame(&frame, 2, 2).unwrap();
        assert_eq!(buffer.data, vec![0, 0, 0, 255, 0, 1, 0, 255, 1, 0, 0, 255, 1, 1, 0, 255]);
    }

    #[test]
    fn test_pixel_buffer_rejects_small_frame() {
        let frame = CapturedFrame {
            data: vec![0; 16],
            width: 2,
            height: 2,
            bytes_per_row: 8,
            timestamp: Duration::ZERO,
        };
        assert!(PixelBuffer::from_frame(&frame, 4, 2).is_err());
    }
}
