//! FFmpeg encoder sink
//!
//! Encodes raw BGRA frames piped over stdin into an H.264/HEVC MP4. Frames
//! are handed to a pump thread through a bounded queue; the queue depth is
//! the encoder's readiness signal, so a slow encoder causes frames to be
//! dropped upstream instead of piling up in memory.
//!
//! Raw video input is constant frame rate, so each frame is placed on the
//! frame-rate grid by its timestamp: gaps left by dropped frames are filled
//! by repeating the previous picture, and a frame landing on a slot that is
//! already filled is skipped. The output stays on the capture clock.

use super::traits::{
    CodecConfig, EncoderSession, EncoderStatus, FinishCallback, PixelBuffer, VideoEncoder,
};
use crate::utils::{RecorderError, RecorderResult};
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Frames allowed in flight between the writer and FFmpeg
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Factory for FFmpeg-backed sessions
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
    queue_depth: usize,
}

impl FfmpegEncoder {
    /// Use `ffmpeg` from PATH
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn create_session(
        &self,
        config: &CodecConfig,
        output: &Path,
    ) -> RecorderResult<Box<dyn EncoderSession>> {
        if config.width % 2 != 0 || config.height % 2 != 0 {
            return Err(RecorderError::EncoderSetupFailed(format!(
                "frame size {}x{} must be even",
                config.width, config.height
            )));
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Box::new(FfmpegSession {
            binary: self.binary.clone(),
            config: config.clone(),
            output: output.to_path_buf(),
            queue_depth: self.queue_depth,
            clock: FrameClock::new(config.frame_rate),
            process: None,
            frames_tx: None,
            pump: None,
            in_flight: Arc::new(AtomicUsize::new(0)),
            shared: Arc::new(Mutex::new(SharedStatus {
                status: EncoderStatus::NotStarted,
                error: None,
            })),
        }))
    }
}

/// Maps frame timestamps onto the constant-rate output grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameClock {
    frame_rate: u32,
    next_slot: u64,
}

impl FrameClock {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            next_slot: 0,
        }
    }

    /// Output slot nearest to `timestamp`
    pub fn slot_for(&self, timestamp: Duration) -> u64 {
        (timestamp.as_secs_f64() * self.frame_rate as f64).round() as u64
    }

    /// Copies of the previous frame needed before a frame at `timestamp`,
    /// or `None` when its slot is already filled.
    pub fn plan(&self, timestamp: Duration) -> Option<u64> {
        let slot = self.slot_for(timestamp);
        slot.checked_sub(self.next_slot)
    }

    /// Record that the frame at `timestamp` was written
    pub fn advance(&mut self, timestamp: Duration) {
        self.next_slot = self.slot_for(timestamp) + 1;
    }

    /// Frames written to the output so far, repeats included
    pub fn frames_emitted(&self) -> u64 {
        self.next_slot
    }
}

/// One queued frame and the repeats of its predecessor that precede it
struct PumpFrame {
    data: Vec<u8>,
    hold_previous: u64,
}

/// FFmpeg command-line arguments for a session
pub fn build_encoder_args(config: &CodecConfig, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pixel_format".to_string(),
        "bgra".to_string(),
        "-video_size".to_string(),
        format!("{}x{}", config.width, config.height),
        "-framerate".to_string(),
        config.frame_rate.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        config.codec.ffmpeg_encoder().to_string(),
        "-b:v".to_string(),
        config.bitrate.to_string(),
        "-g".to_string(),
        config.keyframe_interval.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

struct SharedStatus {
    status: EncoderStatus,
    error: Option<String>,
}

/// One FFmpeg process writing one file
pub struct FfmpegSession {
    binary: PathBuf,
    config: CodecConfig,
    output: PathBuf,
    queue_depth: usize,
    clock: FrameClock,
    process: Option<Child>,
    frames_tx: Option<SyncSender<PumpFrame>>,
    pump: Option<thread::JoinHandle<()>>,
    in_flight: Arc<AtomicUsize>,
    shared: Arc<Mutex<SharedStatus>>,
}

impl FfmpegSession {
    fn fail(&self, message: String) {
        let mut shared = self.shared.lock();
        shared.status = EncoderStatus::Failed;
        shared.error = Some(message);
    }
}

impl EncoderSession for FfmpegSession {
    fn start_writing(&mut self) -> RecorderResult<()> {
        if self.process.is_some() {
            return Ok(());
        }

        let mut process = Command::new(&self.binary)
            .args(build_encoder_args(&self.config, &self.output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecorderError::EncoderSetupFailed(format!("Failed to start FFmpeg: {}", e)))?;

        let mut stdin = process.stdin.take().ok_or_else(|| {
            RecorderError::EncoderSetupFailed("FFmpeg stdin unavailable".to_string())
        })?;

        let (frames_tx, frames_rx) = mpsc::sync_channel::<PumpFrame>(self.queue_depth);
        let in_flight = self.in_flight.clone();
        let shared = self.shared.clone();

        let pump = thread::Builder::new()
            .name("ffmpeg-pump".to_string())
            .spawn(move || {
                let mut previous: Option<Vec<u8>> = None;
                for frame in frames_rx {
                    let mut result = Ok(());
                    let held = previous.as_ref().unwrap_or(&frame.data);
                    for _ in 0..frame.hold_previous {
                        result = stdin.write_all(held);
                        if result.is_err() {
                            break;
                        }
                    }
                    if result.is_ok() {
                        result = stdin.write_all(&frame.data);
                    }
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    previous = Some(frame.data);
                    if let Err(e) = result {
                        let mut shared = shared.lock();
                        shared.status = EncoderStatus::Failed;
                        shared.error = Some(format!("FFmpeg pipe closed: {}", e));
                        break;
                    }
                }
                // dropping stdin signals EOF
            })
            .map_err(|e| {
                let _ = process.kill();
                RecorderError::EncoderSetupFailed(format!("Failed to start encoder thread: {}", e))
            })?;

        tracing::info!(
            "Started FFmpeg encoder: {}x{} @ {}fps, {} bps, output: {:?}",
            self.config.width,
            self.config.height,
            self.config.frame_rate,
            self.config.bitrate,
            self.output
        );

        self.process = Some(process);
        self.frames_tx = Some(frames_tx);
        self.pump = Some(pump);
        self.shared.lock().status = EncoderStatus::Writing;
        Ok(())
    }

    fn start_session(&mut self, at: Duration) {
        // appended timestamps are already relative to `at`
        self.clock = FrameClock::new(self.config.frame_rate);
        tracing::debug!("FFmpeg session timeline starts at {:?}", at);
    }

    fn is_ready_for_more_data(&self) -> bool {
        self.status() == EncoderStatus::Writing
            && self.frames_tx.is_some()
            && self.in_flight.load(Ordering::SeqCst) < self.queue_depth
    }

    fn append(&mut self, buffer: PixelBuffer, timestamp: Duration) -> RecorderResult<()> {
        if buffer.width != self.config.width || buffer.height != self.config.height {
            return Err(RecorderError::WriterAppendFailed(format!(
                "buffer is {}x{}, encoder expects {}x{}",
                buffer.width, buffer.height, self.config.width, self.config.height
            )));
        }

        let frames_tx = self.frames_tx.as_ref().ok_or_else(|| {
            RecorderError::WriterAppendFailed("encoder input is finished".to_string())
        })?;

        let Some(hold_previous) = self.clock.plan(timestamp) else {
            tracing::trace!("Frame at {:?} shares an output slot, skipped", timestamp);
            return Ok(());
        };

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let frame = PumpFrame {
            data: buffer.data,
            hold_previous,
        };
        match frames_tx.try_send(frame) {
            Ok(()) => {
                if hold_previous > 0 {
                    tracing::debug!(
                        "Held previous frame for {} slots before {:?}",
                        hold_previous,
                        timestamp
                    );
                }
                self.clock.advance(timestamp);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Err(RecorderError::WriterAppendFailed("encoder queue full".to_string()))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                let detail = self
                    .last_error()
                    .unwrap_or_else(|| "encoder pipe disconnected".to_string());
                Err(RecorderError::WriterAppendFailed(detail))
            }
        }
    }

    fn mark_finished(&mut self) {
        self.frames_tx.take();
    }

    fn finish(&mut self, done: FinishCallback) {
        self.mark_finished();

        let Some(process) = self.process.take() else {
            done(self.status());
            return;
        };
        let pump = self.pump.take();
        let shared = self.shared.clone();
        let output = self.output.clone();

        let spawned = thread::Builder::new()
            .name("ffmpeg-finish".to_string())
            .spawn(move || {
                if let Some(pump) = pump {
                    let _ = pump.join();
                }

                let status = match process.wait_with_output() {
                    Ok(result) if result.status.success() => EncoderStatus::Completed,
                    Ok(result) => {
                        let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
                        tracing::warn!("FFmpeg exited with status {}: {}", result.status, stderr);
                        shared.lock().error = Some(stderr);
                        EncoderStatus::Failed
                    }
                    Err(e) => {
                        shared.lock().error = Some(e.to_string());
                        EncoderStatus::Failed
                    }
                };

                let status = {
                    let mut shared = shared.lock();
                    if shared.status != EncoderStatus::Failed {
                        shared.status = status;
                    }
                    shared.status
                };

                tracing::info!("FFmpeg finished {:?}: {:?}", output, status);
                done(status);
            });

        if let Err(e) = spawned {
            self.fail(format!("Failed to start finish thread: {}", e));
        }
    }

    fn cancel(&mut self) {
        self.frames_tx.take();

        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
        if let Some(pump) = self.pump.take() {
            let _ = pump.join();
        }
        if self.output.exists() {
            if let Err(e) = std::fs::remove_file(&self.output) {
                tracing::warn!("Failed to remove cancelled output {:?}: {}", self.output, e);
            }
        }

        self.shared.lock().status = EncoderStatus::Cancelled;
        tracing::info!("FFmpeg session cancelled: {:?}", self.output);
    }

    fn status(&self) -> EncoderStatus {
        self.shared.lock().status
    }

    fn last_error(&self) -> Option<String> {
        self.shared.lock().error.clone()
    }
}

impl Drop for FfmpegSession {
    fn drop(&mut self) {
        self.frames_tx.take();
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }
}
