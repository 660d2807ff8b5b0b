//! Capture session
//!
//! Owns the live capture stream and pushes camera source rectangles into it
//! at a throttled rate. The camera ticks at ~60Hz, but reconfiguring the
//! stream that often overwhelms the platform, so pushes are capped
//! (~30Hz by default) and may be up to one push interval stale.

use super::geometry::Rect;
use super::traits::{CaptureSource, CaptureStream, FrameSink, StreamConfig};
use crate::utils::{RecorderError, RecorderResult};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limiter for source-rectangle pushes
#[derive(Debug, Default)]
pub struct RegionThrottle {
    last_push: Option<Instant>,
    last_rect: Option<Rect>,
}

impl RegionThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum spacing between pushes for a rate in Hz
    pub fn interval_for(rate_hz: u32) -> Duration {
        Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64)
    }

    /// Decide whether `rect` should be pushed at `now`, recording it if so.
    ///
    /// Unchanged rectangles are never re-pushed.
    pub fn should_push(&mut self, rect: Rect, now: Instant, min_interval: Duration) -> bool {
        if self.last_rect == Some(rect) {
            return false;
        }
        if let Some(last) = self.last_push {
            if now.saturating_duration_since(last) < min_interval {
                return false;
            }
        }
        self.last_push = Some(now);
        self.last_rect = Some(rect);
        true
    }
}

/// A running capture stream plus its push throttle
pub struct CaptureSession {
    stream: Box<dyn CaptureStream>,
    throttle: Mutex<RegionThrottle>,
    pushes: AtomicU64,
}

impl CaptureSession {
    /// Start a stream on `source`, delivering frames to `sink`
    pub async fn start(
        source: &dyn CaptureSource,
        config: StreamConfig,
        sink: Arc<dyn FrameSink>,
    ) -> RecorderResult<Self> {
        tracing::info!(
            "Starting capture on display {} at {}x{}px, source rect {:?}",
            config.display.id,
            config.pixel_width,
            config.pixel_height,
            config.source_rect
        );

        let initial_rect = config.source_rect;
        let stream = source.start_stream(config, sink).await.map_err(|e| match e {
            RecorderError::StreamStartFailed(_) => e,
            other => RecorderError::StreamStartFailed(other.to_string()),
        })?;

        let mut throttle = RegionThrottle::new();
        throttle.last_rect = Some(initial_rect);

        Ok(Self {
            stream,
            throttle: Mutex::new(throttle),
            pushes: AtomicU64::new(0),
        })
    }

    /// Push `rect` to the stream unless throttled. Returns whether it was pushed.
    pub fn push_region(&self, rect: Rect, now: Instant, rate_hz: u32) -> bool {
        let pushed = self
            .throttle
            .lock()
            .should_push(rect, now, RegionThrottle::interval_for(rate_hz));
        if pushed {
            self.stream.update_region(rect);
            self.pushes.fetch_add(1, Ordering::Relaxed);
        }
        pushed
    }

    /// Number of region updates pushed so far
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::Relaxed)
    }

    /// Stop the underlying stream
    pub async fn stop(&self) -> RecorderResult<()> {
        tracing::info!(
            "Stopping capture stream after {} region updates",
            self.push_count()
        );
        self.stream.stop().await.map_err(|e| match e {
            RecorderError::StreamStopFailed(_) => e,
            other => RecorderError::StreamStopFailed(other.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_display, MockCaptureSource};

    fn rect(x: f64) -> Rect {
        Rect::new(x, 0.0, 100.0, 100.0)
    }

    #[test]
    fn test_throttle_caps_rate() {
        let mut throttle = RegionThrottle::new();
        let start = Instant::now();
        let interval = RegionThrottle::interval_for(30);

        // 60 ticks over one second with a moving rectangle
        let pushed = (0..60)
            .filter(|i| {
                let now = start + Duration::from_micros(16_667 * *i as u64);
                throttle.should_push(rect(*i as f64), now, interval)
            })
            .count();

        assert!(pushed <= 31, "pushed {} times", pushed);
        assert!(pushed >= 29, "pushed {} times", pushed);
    }

    #[test]
    fn test_throttle_skips_unchanged_rect() {
        let mut throttle = RegionThrottle::new();
        let start = Instant::now();
        let interval = RegionThrottle::interval_for(30);

        assert!(throttle.should_push(rect(1.0), start, interval));
        assert!(!throttle.should_push(rect(1.0), start + Duration::from_secs(1), interval));
        assert!(throttle.should_push(rect(2.0), start + Duration::from_secs(1), interval));
    }

    #[tokio::test]
    async fn test_session_pushes_to_stream() {
        let source = MockCaptureSource::new(vec![test_display()]);
        let config = StreamConfig {
            display: test_display(),
            pixel_width: 1920,
            pixel_height: 1080,
            frame_interval: Duration::from_millis(16),
            source_rect: rect(0.0),
        };
        let sink = Arc::new(crate::testing::NullSink);
        let session = CaptureSession::start(&source, config, sink).await.unwrap();

        let now = Instant::now();
        assert!(!session.push_region(rect(0.0), now, 30));
        assert!(session.push_region(rect(5.0), now, 30));
        assert!(!session.push_region(rect(6.0), now + Duration::from_millis(10), 30));

        assert_eq!(source.pushed_regions(), vec![rect(5.0)]);
        session.stop().await.unwrap();
        assert!(source.stream_stopped());
    }

    #[tokio::test]
    async fn test_start_failure_maps_to_stream_start_failed() {
        let source = MockCaptureSource::new(vec![test_display()]);
        source.fail_start(true);
        let config = StreamConfig {
            display: test_display(),
            pixel_width: 1920,
            pixel_height: 1080,
            frame_interval: Duration::from_millis(16),
            source_rect: rect(0.0),
        };

        let result = CaptureSession::start(&source, config, Arc::new(crate::testing::NullSink)).await;
        assert!(matches!(result, Err(RecorderError::StreamStartFailed(_))));
    }
}
