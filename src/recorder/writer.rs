//! Frame writer
//!
//! Appends captured frames to one encoder session in arrival order. Frame
//! delivery happens on the capture source's thread, so every submission goes
//! through a single lock around the session: one logical writer at a time.
//!
//! The writer favours real-time behaviour over completeness. Frames are
//! dropped, never queued, when the encoder is busy, when timestamps go
//! backwards, after the encoder has failed, and once stopping has begun.

use crate::capture::{CapturedFrame, FrameSink};
use crate::config::ZoomSettings;
use crate::encoder::{
    even_dimension, CodecConfig, EncoderSession, EncoderStatus, PixelBuffer, VideoCodec,
    VideoEncoder,
};
use crate::recorder::state::FinalizeOutcome;
use crate::utils::{RecorderError, RecorderResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Snapshot of writer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterCounts {
    pub appended: u64,
    /// Arrived after stopping began
    pub dropped_stopping: u64,
    /// Arrived after the encoder completed, failed or was cancelled
    pub dropped_inactive: u64,
    /// Encoder was not ready for more data
    pub dropped_not_ready: u64,
    /// Timestamp went backwards
    pub dropped_out_of_order: u64,
    pub append_failures: u64,
}

impl WriterCounts {
    pub fn total_dropped(&self) -> u64 {
        self.dropped_stopping
            + self.dropped_inactive
            + self.dropped_not_ready
            + self.dropped_out_of_order
            + self.append_failures
    }
}

#[derive(Debug, Default)]
struct WriterStats {
    appended: AtomicU64,
    dropped_stopping: AtomicU64,
    dropped_inactive: AtomicU64,
    dropped_not_ready: AtomicU64,
    dropped_out_of_order: AtomicU64,
    append_failures: AtomicU64,
}

impl WriterStats {
    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn snapshot(&self) -> WriterCounts {
        WriterCounts {
            appended: self.appended.load(Ordering::Relaxed),
            dropped_stopping: self.dropped_stopping.load(Ordering::Relaxed),
            dropped_inactive: self.dropped_inactive.load(Ordering::Relaxed),
            dropped_not_ready: self.dropped_not_ready.load(Ordering::Relaxed),
            dropped_out_of_order: self.dropped_out_of_order.load(Ordering::Relaxed),
            append_failures: self.append_failures.load(Ordering::Relaxed),
        }
    }
}

/// The encoder session plus its timeline
struct WriterSession {
    encoder: Box<dyn EncoderSession>,
    /// Capture timestamp of the first frame
    origin: Option<Duration>,
    last_timestamp: Option<Duration>,
    /// At least one frame reached the encoder
    wrote_frame: bool,
    finalized: bool,
}

impl WriterSession {
    /// Writer-level status: writing only once a frame was actually appended
    fn status(&self) -> EncoderStatus {
        match self.encoder.status() {
            EncoderStatus::Writing if !self.wrote_frame => EncoderStatus::NotStarted,
            status => status,
        }
    }
}

fn outcome_for(status: EncoderStatus) -> FinalizeOutcome {
    match status {
        EncoderStatus::Completed => FinalizeOutcome::Completed,
        EncoderStatus::Cancelled | EncoderStatus::NotStarted => FinalizeOutcome::Cancelled,
        EncoderStatus::Failed => FinalizeOutcome::Failed,
        EncoderStatus::Writing => FinalizeOutcome::TimedOut,
    }
}

/// Exclusive owner of one recording's encoder session
pub struct FrameWriter {
    output: PathBuf,
    width: u32,
    height: u32,
    session: Arc<Mutex<WriterSession>>,
    stopping: AtomicBool,
    stats: WriterStats,
}

impl FrameWriter {
    /// Create the encoder session and start writing.
    ///
    /// Frame dimensions are rounded down to even numbers once, here, and
    /// every appended pixel buffer uses the rounded size.
    pub fn create(
        encoder: &dyn VideoEncoder,
        output: PathBuf,
        pixel_width: u32,
        pixel_height: u32,
        settings: &ZoomSettings,
    ) -> RecorderResult<Self> {
        let width = even_dimension(pixel_width);
        let height = even_dimension(pixel_height);
        let frame_rate = settings.frame_rate.max(1);

        let config = CodecConfig {
            codec: VideoCodec::H264,
            width,
            height,
            bitrate: settings.quality.bitrate(width, height, frame_rate),
            keyframe_interval: frame_rate * 2,
            frame_rate,
        };

        let setup_failed = |e: RecorderError| match e {
            RecorderError::EncoderSetupFailed(_) => e,
            other => RecorderError::EncoderSetupFailed(other.to_string()),
        };

        let mut session = encoder.create_session(&config, &output).map_err(setup_failed)?;
        session.start_writing().map_err(setup_failed)?;

        tracing::info!(
            "Frame writer ready: {}x{} ({}x{} requested) -> {:?}",
            width,
            height,
            pixel_width,
            pixel_height,
            output
        );

        Ok(Self {
            output,
            width,
            height,
            session: Arc::new(Mutex::new(WriterSession {
                encoder: session,
                origin: None,
                last_timestamp: None,
                wrote_frame: false,
                finalized: false,
            })),
            stopping: AtomicBool::new(false),
            stats: WriterStats::default(),
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Encoded frame size after even rounding
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn status(&self) -> EncoderStatus {
        self.session.lock().status()
    }

    pub fn counts(&self) -> WriterCounts {
        self.stats.snapshot()
    }

    /// Refuse every frame from now on. Set once, before finalizing.
    pub fn begin_stopping(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Close out the session.
    ///
    /// A session that never appended a frame is cancelled outright, off the
    /// async worker since cancelling may wait on the encoder. Otherwise
    /// the encoder is flushed, waiting at most `timeout`; on timeout the file
    /// is left as is and [`RecorderError::FinalizeTimeout`] is returned. Only
    /// the first call has any effect.
    pub async fn finalize(&self, timeout: Duration) -> RecorderResult<FinalizeOutcome> {
        self.begin_stopping();

        let finished_rx = {
            let mut session = self.session.lock();
            if session.finalized {
                return Ok(outcome_for(session.status()));
            }
            session.finalized = true;

            match session.status() {
                EncoderStatus::NotStarted => None,
                EncoderStatus::Writing => {
                    let (tx, rx) = oneshot::channel();
                    session.encoder.mark_finished();
                    session.encoder.finish(Box::new(move |status| {
                        let _ = tx.send(status);
                    }));
                    Some(rx)
                }
                status => return Ok(outcome_for(status)),
            }
        };

        let Some(finished_rx) = finished_rx else {
            let session = self.session.clone();
            let cancelled = tokio::task::spawn_blocking(move || session.lock().encoder.cancel()).await;
            if let Err(e) = cancelled {
                tracing::warn!("Encoder cancel for {:?} did not complete: {}", self.output, e);
                return Ok(FinalizeOutcome::Failed);
            }
            tracing::info!("No frames written, cancelled {:?}", self.output);
            return Ok(FinalizeOutcome::Cancelled);
        };

        match tokio::time::timeout(timeout, finished_rx).await {
            Ok(Ok(EncoderStatus::Completed)) => {
                let counts = self.counts();
                tracing::info!(
                    "Finalized {:?}: {} frames written, {} dropped",
                    self.output,
                    counts.appended,
                    counts.total_dropped()
                );
                Ok(FinalizeOutcome::Completed)
            }
            Ok(Ok(status)) => {
                let detail = self.session.lock().encoder.last_error();
                tracing::warn!(
                    "Encoder finished {:?} with status {:?}: {}",
                    self.output,
                    status,
                    detail.unwrap_or_default()
                );
                Ok(outcome_for(status))
            }
            Ok(Err(_)) => {
                tracing::warn!("Encoder dropped its finish callback for {:?}", self.output);
                Ok(FinalizeOutcome::Failed)
            }
            Err(_) => {
                tracing::warn!(
                    "Encoder flush for {:?} exceeded {:?}, keeping partial file",
                    self.output,
                    timeout
                );
                Err(RecorderError::FinalizeTimeout(timeout))
            }
        }
    }
}

impl FrameSink for FrameWriter {
    fn submit_frame(&self, frame: CapturedFrame) {
        if self.stopping.load(Ordering::SeqCst) {
            WriterStats::bump(&self.stats.dropped_stopping);
            return;
        }

        let mut session = self.session.lock();
        if session.finalized {
            WriterStats::bump(&self.stats.dropped_stopping);
            return;
        }

        let status = session.encoder.status();
        if status.is_terminal() {
            let dropped = WriterStats::bump(&self.stats.dropped_inactive);
            if dropped == 1 {
                tracing::warn!("Encoder is {:?}, dropping further frames", status);
            }
            return;
        }

        let timestamp = frame.timestamp;
        let origin = match session.origin {
            Some(origin) => {
                if session.last_timestamp.is_some_and(|last| timestamp < last) {
                    WriterStats::bump(&self.stats.dropped_out_of_order);
                    tracing::warn!(
                        "Dropping out-of-order frame at {:?} (last {:?})",
                        timestamp,
                        session.last_timestamp
                    );
                    return;
                }
                origin
            }
            None => {
                session.encoder.start_session(timestamp);
                session.origin = Some(timestamp);
                tracing::debug!("Writer session started at capture time {:?}", timestamp);
                timestamp
            }
        };
        session.last_timestamp = Some(timestamp);

        if !session.encoder.is_ready_for_more_data() {
            let dropped = WriterStats::bump(&self.stats.dropped_not_ready);
            tracing::debug!("Encoder busy, dropped frame ({} so far)", dropped);
            return;
        }

        let buffer = match PixelBuffer::from_frame(&frame, self.width, self.height) {
            Ok(buffer) => buffer,
            Err(e) => {
                WriterStats::bump(&self.stats.append_failures);
                tracing::warn!("{}", e);
                return;
            }
        };

        match session.encoder.append(buffer, timestamp.saturating_sub(origin)) {
            Ok(()) => {
                session.wrote_frame = true;
                WriterStats::bump(&self.stats.appended);
            }
            Err(e) => {
                WriterStats::bump(&self.stats.append_failures);
                tracing::warn!(
                    "{} (encoder: {})",
                    e,
                    session.encoder.last_error().unwrap_or_else(|| "no detail".to_string())
                );
            }
        }
    }
}
