//! Synthetic capture source
//!
//! Generates BGRA test-pattern frames on a tokio task at the requested frame
//! interval. Used for headless runs and to exercise the pipeline without
//! screen-recording permission.

use super::geometry::Rect;
use super::traits::{CaptureSource, CaptureStream, CapturedFrame, DisplayInfo, FrameSink, StreamConfig};
use crate::utils::{RecorderError, RecorderResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Capture source that fabricates frames for a fixed set of displays
pub struct SyntheticCaptureSource {
    displays: Vec<DisplayInfo>,
}

impl SyntheticCaptureSource {
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        Self { displays }
    }

    /// A single 1920x1080 primary display
    pub fn single_display() -> Self {
        Self::new(vec![DisplayInfo {
            id: 1,
            name: "Main Display".to_string(),
            width: 1920,
            height: 1080,
            scale_factor: 1.0,
            is_primary: true,
            refresh_rate: Some(60),
        }])
    }
}

#[async_trait]
impl CaptureSource for SyntheticCaptureSource {
    async fn displays(&self) -> RecorderResult<Vec<DisplayInfo>> {
        Ok(self.displays.clone())
    }

    async fn start_stream(
        &self,
        config: StreamConfig,
        sink: Arc<dyn FrameSink>,
    ) -> RecorderResult<Box<dyn CaptureStream>> {
        if config.pixel_width == 0 || config.pixel_height == 0 {
            return Err(RecorderError::StreamStartFailed(format!(
                "Invalid frame size {}x{}",
                config.pixel_width, config.pixel_height
            )));
        }

        let is_running = Arc::new(AtomicBool::new(true));
        let source_rect = Arc::new(Mutex::new(config.source_rect));
        let frames_delivered = Arc::new(AtomicU64::new(0));

        let handle = {
            let is_running = is_running.clone();
            let source_rect = source_rect.clone();
            let frames_delivered = frames_delivered.clone();
            let width = config.pixel_width;
            let height = config.pixel_height;
            let frame_interval = config.frame_interval;

            tokio::spawn(async move {
                let start_time = Instant::now();
                let mut interval = tokio::time::interval(frame_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                while is_running.load(Ordering::SeqCst) {
                    interval.tick().await;
                    if !is_running.load(Ordering::SeqCst) {
                        break;
                    }

                    let frame_index = frames_delivered.fetch_add(1, Ordering::Relaxed);
                    let rect = *source_rect.lock();
                    sink.submit_frame(CapturedFrame {
                        data: test_pattern(width, height, frame_index, rect),
                        width,
                        height,
                        bytes_per_row: width * 4,
                        timestamp: start_time.elapsed(),
                    });
                }

                tracing::info!(
                    "Synthetic capture stopped. Delivered {} frames",
                    frames_delivered.load(Ordering::Relaxed)
                );
            })
        };

        Ok(Box::new(SyntheticStream {
            is_running,
            source_rect,
            region_updates: AtomicU64::new(0),
            handle: Mutex::new(Some(handle)),
        }))
    }
}

/// Solid frame whose shade encodes the frame index and source rectangle
fn test_pattern(width: u32, height: u32, frame_index: u64, rect: Rect) -> Vec<u8> {
    let shade = ((frame_index * 4) % 256) as u8;
    let tint = (rect.origin.x as u64 % 256) as u8;
    let mut data = vec![0u8; (width * height * 4) as usize];
    for pixel in data.chunks_exact_mut(4) {
        pixel[0] = shade;
        pixel[1] = tint;
        pixel[2] = 0x40;
        pixel[3] = 0xff;
    }
    data
}

struct SyntheticStream {
    is_running: Arc<AtomicBool>,
    source_rect: Arc<Mutex<Rect>>,
    region_updates: AtomicU64,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[async_trait]
impl CaptureStream for SyntheticStream {
    fn update_region(&self, source_rect: Rect) {
        *self.source_rect.lock() = source_rect;
        self.region_updates.fetch_add(1, Ordering::Relaxed);
    }

    async fn stop(&self) -> RecorderResult<()> {
        self.is_running.store(false, Ordering::SeqCst);

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| RecorderError::StreamStopFailed(e.to_string()))?;
        }

        tracing::debug!(
            "Synthetic stream received {} region updates",
            self.region_updates.load(Ordering::Relaxed)
        );
        Ok(())
    }
}
