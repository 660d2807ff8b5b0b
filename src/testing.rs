//! Test doubles for the capture, encoder and attention collaborators

use crate::attention::AttentionSignalSource;
use crate::capture::{
    CaptureSource, CaptureStream, CapturedFrame, DisplayInfo, FrameSink, Point, Rect, StreamConfig,
};
use crate::encoder::{
    CodecConfig, EncoderSession, EncoderStatus, FinishCallback, PixelBuffer, VideoEncoder,
};
use crate::utils::{RecorderError, RecorderResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn test_display() -> DisplayInfo {
    DisplayInfo {
        id: 1,
        name: "Main Display".to_string(),
        width: 1920,
        height: 1080,
        scale_factor: 1.0,
        is_primary: true,
        refresh_rate: Some(60),
    }
}

/// Blank BGRA frame of the given size
pub fn frame_sized(ms: u64, width: u32, height: u32) -> CapturedFrame {
    CapturedFrame {
        data: vec![0x80; (width * height * 4) as usize],
        width,
        height,
        bytes_per_row: width * 4,
        timestamp: Duration::from_millis(ms),
    }
}

/// Blank 8x8 frame at `ms` on the capture clock
pub fn frame_at(ms: u64) -> CapturedFrame {
    frame_sized(ms, 8, 8)
}

pub struct NullSink;

impl FrameSink for NullSink {
    fn submit_frame(&self, _frame: CapturedFrame) {}
}

#[derive(Default)]
pub struct CollectingSink {
    timestamps: Mutex<Vec<Duration>>,
}

impl CollectingSink {
    pub fn timestamps(&self) -> Vec<Duration> {
        self.timestamps.lock().clone()
    }
}

impl FrameSink for CollectingSink {
    fn submit_frame(&self, frame: CapturedFrame) {
        self.timestamps.lock().push(frame.timestamp);
    }
}

/// Attention source whose point is set by the test
#[derive(Default)]
pub struct ScriptedAttention {
    point: Mutex<Option<Point>>,
}

impl ScriptedAttention {
    pub fn set(&self, point: Option<Point>) {
        *self.point.lock() = point;
    }
}

impl AttentionSignalSource for ScriptedAttention {
    fn sample(&self) -> Option<Point> {
        *self.point.lock()
    }
}

/// Capture source that records what the recorder asks of it
pub struct MockCaptureSource {
    displays: Mutex<Vec<DisplayInfo>>,
    fail_start: AtomicBool,
    fail_stop: Arc<AtomicBool>,
    streams_started: AtomicUsize,
    regions: Arc<Mutex<Vec<Rect>>>,
    stopped: Arc<AtomicBool>,
    sink: Mutex<Option<Arc<dyn FrameSink>>>,
    last_config: Mutex<Option<StreamConfig>>,
}

impl MockCaptureSource {
    pub fn new(displays: Vec<DisplayInfo>) -> Self {
        Self {
            displays: Mutex::new(displays),
            fail_start: AtomicBool::new(false),
            fail_stop: Arc::new(AtomicBool::new(false)),
            streams_started: AtomicUsize::new(0),
            regions: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(AtomicBool::new(false)),
            sink: Mutex::new(None),
            last_config: Mutex::new(None),
        }
    }

    pub fn set_displays(&self, displays: Vec<DisplayInfo>) {
        *self.displays.lock() = displays;
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn streams_started(&self) -> usize {
        self.streams_started.load(Ordering::SeqCst)
    }

    pub fn pushed_regions(&self) -> Vec<Rect> {
        self.regions.lock().clone()
    }

    pub fn stream_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn last_stream_config(&self) -> Option<StreamConfig> {
        self.last_config.lock().clone()
    }

    /// Hand a frame to the sink of the most recent stream
    pub fn deliver(&self, frame: CapturedFrame) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink.submit_frame(frame);
        }
    }

    /// Deliver a frame sized for the most recent stream
    pub fn emit_frame(&self, ms: u64) {
        let (width, height) = self
            .last_stream_config()
            .map(|c| (c.pixel_width, c.pixel_height))
            .unwrap_or((8, 8));
        self.deliver(frame_sized(ms, width, height));
    }
}

#[async_trait]
impl CaptureSource for MockCaptureSource {
    async fn displays(&self) -> RecorderResult<Vec<DisplayInfo>> {
        Ok(self.displays.lock().clone())
    }

    async fn start_stream(
        &self,
        config: StreamConfig,
        sink: Arc<dyn FrameSink>,
    ) -> RecorderResult<Box<dyn CaptureStream>> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(RecorderError::StreamStartFailed("mock stream refused".to_string()));
        }

        self.streams_started.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(false, Ordering::SeqCst);
        *self.sink.lock() = Some(sink);
        *self.last_config.lock() = Some(config);

        Ok(Box::new(MockStream {
            regions: self.regions.clone(),
            stopped: self.stopped.clone(),
            fail_stop: self.fail_stop.clone(),
        }))
    }
}

struct MockStream {
    regions: Arc<Mutex<Vec<Rect>>>,
    stopped: Arc<AtomicBool>,
    fail_stop: Arc<AtomicBool>,
}

#[async_trait]
impl CaptureStream for MockStream {
    fn update_region(&self, source_rect: Rect) {
        self.regions.lock().push(source_rect);
    }

    async fn stop(&self) -> RecorderResult<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(RecorderError::StreamStopFailed("mock stream stuck".to_string()));
        }
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared knobs and observations for [`MockEncoder`] sessions
pub struct MockEncoderControl {
    ready: AtomicBool,
    fail_append: AtomicBool,
    fail_create: AtomicBool,
    hang_on_finish: AtomicBool,
    cancel_delay: Mutex<Duration>,
    status: Mutex<EncoderStatus>,
    session_start: Mutex<Option<Duration>>,
    appended: Mutex<Vec<Duration>>,
    finish_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    configs: Mutex<Vec<CodecConfig>>,
    pending_finish: Mutex<Vec<FinishCallback>>,
}

impl Default for MockEncoderControl {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(true),
            fail_append: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            hang_on_finish: AtomicBool::new(false),
            cancel_delay: Mutex::new(Duration::ZERO),
            status: Mutex::new(EncoderStatus::NotStarted),
            session_start: Mutex::new(None),
            appended: Mutex::new(Vec::new()),
            finish_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            configs: Mutex::new(Vec::new()),
            pending_finish: Mutex::new(Vec::new()),
        }
    }
}

impl MockEncoderControl {
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_fail_append(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Never invoke finish callbacks (they are kept alive, not dropped)
    pub fn set_hang_on_finish(&self, hang: bool) {
        self.hang_on_finish.store(hang, Ordering::SeqCst);
    }

    /// Make `cancel` block its thread for `delay`, like a process teardown
    pub fn set_cancel_delay(&self, delay: Duration) {
        *self.cancel_delay.lock() = delay;
    }

    pub fn set_status(&self, status: EncoderStatus) {
        *self.status.lock() = status;
    }

    pub fn status(&self) -> EncoderStatus {
        *self.status.lock()
    }

    pub fn session_start(&self) -> Option<Duration> {
        *self.session_start.lock()
    }

    /// Relative timestamps of appended frames
    pub fn appended(&self) -> Vec<Duration> {
        self.appended.lock().clone()
    }

    pub fn finish_calls(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn configs(&self) -> Vec<CodecConfig> {
        self.configs.lock().clone()
    }
}

#[derive(Default)]
pub struct MockEncoder {
    control: Arc<MockEncoderControl>,
}

impl MockEncoder {
    pub fn control(&self) -> Arc<MockEncoderControl> {
        self.control.clone()
    }
}

impl VideoEncoder for MockEncoder {
    fn create_session(
        &self,
        config: &CodecConfig,
        _output: &Path,
    ) -> RecorderResult<Box<dyn EncoderSession>> {
        if self.control.fail_create.load(Ordering::SeqCst) {
            return Err(RecorderError::EncoderSetupFailed(
                "mock encoder unavailable".to_string(),
            ));
        }
        self.control.configs.lock().push(config.clone());
        Ok(Box::new(MockEncoderSession {
            control: self.control.clone(),
        }))
    }
}

struct MockEncoderSession {
    control: Arc<MockEncoderControl>,
}

impl EncoderSession for MockEncoderSession {
    fn start_writing(&mut self) -> RecorderResult<()> {
        self.control.set_status(EncoderStatus::Writing);
        Ok(())
    }

    fn start_session(&mut self, at: Duration) {
        *self.control.session_start.lock() = Some(at);
    }

    fn is_ready_for_more_data(&self) -> bool {
        self.control.ready.load(Ordering::SeqCst) && self.control.status() == EncoderStatus::Writing
    }

    fn append(&mut self, _buffer: PixelBuffer, timestamp: Duration) -> RecorderResult<()> {
        if self.control.fail_append.load(Ordering::SeqCst) {
            return Err(RecorderError::WriterAppendFailed("mock append rejected".to_string()));
        }
        self.control.appended.lock().push(timestamp);
        Ok(())
    }

    fn mark_finished(&mut self) {}

    fn finish(&mut self, done: FinishCallback) {
        self.control.finish_calls.fetch_add(1, Ordering::SeqCst);
        if self.control.hang_on_finish.load(Ordering::SeqCst) {
            self.control.pending_finish.lock().push(done);
            return;
        }
        self.control.set_status(EncoderStatus::Completed);
        done(EncoderStatus::Completed);
    }

    fn cancel(&mut self) {
        let delay = *self.control.cancel_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.control.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.control.set_status(EncoderStatus::Cancelled);
    }

    fn status(&self) -> EncoderStatus {
        self.control.status()
    }

    fn last_error(&self) -> Option<String> {
        None
    }
}
