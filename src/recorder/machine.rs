//! Recording state machine
//!
//! Couples the camera, the capture stream and the frame writer through
//! explicit states:
//!
//! ```text
//! Idle -> Starting -> Recording -> Stopping -> Idle
//!            |                        |
//!            +------> Errored <-------+
//!                        |
//!                        +--> Idle (after a short grace delay)
//! ```
//!
//! A start request outside `Idle`, or a stop request outside `Recording`, is
//! ignored. The guard state is claimed atomically, so concurrent requests
//! cannot both proceed.

use super::events::{RecordingEvent, EVENT_CHANNEL_CAPACITY};
use super::output::next_output_path;
use super::state::{FinalizeOutcome, RecordingOutput, RecordingState};
use super::writer::FrameWriter;
use crate::attention::AttentionSignalSource;
use crate::camera::{CameraController, CameraDriver, CameraState};
use crate::capture::{CaptureSession, CaptureSource, DisplayInfo, FrameSink, Selection, StreamConfig};
use crate::config::{RecorderConfig, ZoomSettings};
use crate::encoder::VideoEncoder;
use crate::utils::{RecorderError, RecorderResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

/// External collaborators the recorder drives
#[derive(Clone)]
pub struct RecorderDeps {
    pub capture: Arc<dyn CaptureSource>,
    pub encoder: Arc<dyn VideoEncoder>,
    pub attention: Arc<dyn AttentionSignalSource>,
}

/// Everything that exists only while recording
struct ActiveRecording {
    capture: Arc<CaptureSession>,
    writer: Arc<FrameWriter>,
    camera: CameraDriver,
    started_at: DateTime<Utc>,
    started: Instant,
}

/// Top-level recorder
pub struct RecordingStateMachine {
    state: Arc<RwLock<RecordingState>>,
    deps: RecorderDeps,
    config: RwLock<RecorderConfig>,
    selection: RwLock<Selection>,
    settings_tx: watch::Sender<ZoomSettings>,
    camera_tx: Arc<watch::Sender<Option<CameraState>>>,
    event_tx: broadcast::Sender<RecordingEvent>,
    active: Mutex<Option<ActiveRecording>>,
    error_reset: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RecordingStateMachine {
    pub fn new(deps: RecorderDeps, config: RecorderConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (settings_tx, _) = watch::channel(config.zoom.sanitized());
        let (camera_tx, _) = watch::channel(None);

        Self {
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            deps,
            config: RwLock::new(config),
            selection: RwLock::new(Selection::FullScreen),
            settings_tx,
            camera_tx: Arc::new(camera_tx),
            event_tx,
            active: Mutex::new(None),
            error_reset: parking_lot::Mutex::new(None),
        }
    }

    /// Get the current recording state
    pub fn state(&self) -> RecordingState {
        self.state.read().clone()
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Watch the camera state published every tick while recording
    pub fn camera(&self) -> watch::Receiver<Option<CameraState>> {
        self.camera_tx.subscribe()
    }

    pub fn config(&self) -> RecorderConfig {
        self.config.read().clone()
    }

    /// Set the region for the next recording. Ignored while a recording is live.
    pub fn set_selection(&self, selection: Selection) -> bool {
        if !self.state.read().is_idle() {
            tracing::debug!("Ignoring region change while {:?}", self.state());
            return false;
        }
        *self.selection.write() = selection;
        true
    }

    /// Replace the zoom settings; a live recording picks them up on the next tick
    pub fn update_settings(&self, settings: ZoomSettings) {
        let settings = settings.sanitized();
        self.config.write().zoom = settings.clone();
        self.settings_tx.send_replace(settings);
    }

    /// Replace the whole configuration (output directory, display, timeouts, zoom)
    pub fn update_config(&self, config: RecorderConfig) {
        let zoom = config.zoom.sanitized();
        *self.config.write() = RecorderConfig {
            zoom: zoom.clone(),
            ..config
        };
        self.settings_tx.send_replace(zoom);
    }

    /// Move to `next` if the transition is legal
    fn transition(&self, next: RecordingState) -> bool {
        let mut state = self.state.write();
        if !state.can_transition_to(&next) {
            tracing::debug!("Rejected transition {:?} -> {:?}", *state, next);
            return false;
        }
        tracing::info!("Recording state {:?} -> {:?}", *state, next);
        *state = next.clone();
        drop(state);

        let _ = self.event_tx.send(RecordingEvent::StateChanged(next));
        true
    }

    /// Start recording.
    ///
    /// Returns the output path, or `None` if the recorder was not idle.
    pub async fn start(&self) -> RecorderResult<Option<PathBuf>> {
        if !self.transition(RecordingState::Starting) {
            tracing::debug!("Start ignored while {:?}", self.state());
            return Ok(None);
        }

        match self.start_inner().await {
            Ok(active) => {
                let output = active.writer.output().to_path_buf();
                *self.active.lock().await = Some(active);
                self.transition(RecordingState::Recording);
                let _ = self.event_tx.send(RecordingEvent::Started {
                    output: output.clone(),
                });
                tracing::info!("Recording started: {:?}", output);
                Ok(Some(output))
            }
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.camera_tx.send_replace(None);
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn start_inner(&self) -> RecorderResult<ActiveRecording> {
        let config = self.config();
        let settings = self.settings_tx.borrow().clone();

        let displays = self.deps.capture.displays().await?;
        let display = DisplayInfo::select(&displays, config.display_id)
            .cloned()
            .ok_or(RecorderError::NoDisplayFound)?;

        let region = self.selection.read().resolve(display.size());
        let controller = CameraController::new(display.size(), region);
        let initial = *controller.state();
        self.camera_tx.send_replace(Some(initial));

        let base = region.base_rect(display.size());
        let pixel_width = (base.size.width * display.scale_factor).round() as u32;
        let pixel_height = (base.size.height * display.scale_factor).round() as u32;

        let started_at = Utc::now();
        let output = next_output_path(&config.resolved_output_dir(), started_at)
            .map_err(|e| RecorderError::EncoderSetupFailed(e.to_string()))?;

        let writer = Arc::new(FrameWriter::create(
            self.deps.encoder.as_ref(),
            output,
            pixel_width,
            pixel_height,
            &settings,
        )?);
        let (width, height) = writer.dimensions();

        let stream_config = StreamConfig {
            display,
            pixel_width: width,
            pixel_height: height,
            frame_interval: settings.frame_interval(),
            source_rect: initial.source_rect,
        };
        let sink: Arc<dyn FrameSink> = writer.clone();
        let capture = match CaptureSession::start(self.deps.capture.as_ref(), stream_config, sink).await {
            Ok(capture) => Arc::new(capture),
            Err(e) => {
                // never wrote a frame, so this cancels the session
                if let Err(finalize_error) = writer.finalize(config.finalize_timeout()).await {
                    tracing::warn!("Writer cleanup failed: {}", finalize_error);
                }
                return Err(e);
            }
        };

        let camera = CameraDriver::spawn(
            controller,
            self.deps.attention.clone(),
            capture.clone(),
            self.settings_tx.subscribe(),
            self.camera_tx.clone(),
        );

        Ok(ActiveRecording {
            capture,
            writer,
            camera,
            started_at,
            started: Instant::now(),
        })
    }

    /// Stop recording.
    ///
    /// Returns `None` if the recorder was not recording. The machine always
    /// leaves `Stopping`, even when teardown fails.
    pub async fn stop(&self) -> RecorderResult<Option<RecordingOutput>> {
        if !self.transition(RecordingState::Stopping) {
            tracing::debug!("Stop ignored while {:?}", self.state());
            return Ok(None);
        }

        let active = self.active.lock().await.take();
        let Some(active) = active else {
            tracing::warn!("No active recording to stop");
            self.transition(RecordingState::Idle);
            return Ok(None);
        };

        match self.stop_inner(active).await {
            Ok(output) => {
                self.camera_tx.send_replace(None);
                self.transition(RecordingState::Idle);
                let _ = self.event_tx.send(RecordingEvent::Stopped(output.clone()));
                tracing::info!(
                    "Recording stopped. Duration: {:.0}ms, {} frames",
                    output.duration_ms,
                    output.frames_written
                );
                Ok(Some(output))
            }
            Err(e) => {
                tracing::error!("Failed to stop recording cleanly: {}", e);
                self.camera_tx.send_replace(None);
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn stop_inner(&self, mut active: ActiveRecording) -> RecorderResult<RecordingOutput> {
        let finalize_timeout = self.config.read().finalize_timeout();

        // Late frames must not race the finalize below
        active.writer.begin_stopping();
        active.camera.stop().await;

        let stream_result = active.capture.stop().await;
        if let Err(e) = &stream_result {
            tracing::error!("{}", e);
        }

        let finalize = match active.writer.finalize(finalize_timeout).await {
            Ok(outcome) => outcome,
            Err(e) if !e.is_fatal() => {
                tracing::warn!("{}", e);
                FinalizeOutcome::TimedOut
            }
            Err(e) => return Err(e),
        };
        stream_result?;

        let counts = active.writer.counts();
        Ok(RecordingOutput {
            output_path: active.writer.output().to_path_buf(),
            started_at: active.started_at,
            duration_ms: active.started.elapsed().as_secs_f64() * 1000.0,
            frames_written: counts.appended,
            frames_dropped: counts.total_dropped(),
            finalize,
        })
    }

    /// Enter `Errored` and schedule the return to `Idle`
    fn fail(&self, reason: String) {
        if !self.transition(RecordingState::Errored(reason.clone())) {
            // Not a legal transition from here; never leave the machine stuck
            tracing::warn!("Forcing errored state from {:?}", self.state());
            *self.state.write() = RecordingState::Errored(reason.clone());
        }
        let _ = self.event_tx.send(RecordingEvent::Error(reason));

        let grace = self.config.read().error_grace();
        let state = self.state.clone();
        let event_tx = self.event_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let mut current = state.write();
            if matches!(*current, RecordingState::Errored(_)) {
                *current = RecordingState::Idle;
                drop(current);
                tracing::info!("Recording state cleared to Idle");
                let _ = event_tx.send(RecordingEvent::StateChanged(RecordingState::Idle));
            }
        });

        if let Some(previous) = self.error_reset.lock().replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for RecordingStateMachine {
    fn drop(&mut self) {
        if let Some(handle) = self.error_reset.lock().take() {
            handle.abort();
        }
    }
}
