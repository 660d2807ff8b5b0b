//! Periodic camera tick
//!
//! Runs the [`CameraController`] on its own task at the configured tick rate.
//! The task owns the controller outright; the rest of the recorder only sees
//! published [`CameraState`] snapshots and the throttled region pushes.

use super::controller::{CameraController, CameraState};
use crate::attention::AttentionSignalSource;
use crate::capture::CaptureSession;
use crate::config::ZoomSettings;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a running camera tick task
pub struct CameraDriver {
    is_running: Arc<AtomicBool>,
    handle: Option<JoinHandle<CameraController>>,
}

impl CameraDriver {
    /// Spawn the tick task
    pub fn spawn(
        mut controller: CameraController,
        attention: Arc<dyn AttentionSignalSource>,
        capture: Arc<CaptureSession>,
        settings: watch::Receiver<ZoomSettings>,
        camera_tx: Arc<watch::Sender<Option<CameraState>>>,
    ) -> Self {
        let is_running = Arc::new(AtomicBool::new(true));
        let tick_interval = settings.borrow().tick_interval();

        let handle = {
            let is_running = is_running.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick_interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                let mut last_tick = Instant::now();
                let mut ticks = 0u64;

                while is_running.load(Ordering::SeqCst) {
                    interval.tick().await;
                    if !is_running.load(Ordering::SeqCst) {
                        break;
                    }

                    let now = Instant::now();
                    let dt = now.saturating_duration_since(last_tick);
                    last_tick = now;

                    let current = settings.borrow().clone();
                    let sample = attention.sample();
                    let state = *controller.tick(sample, &current, dt);

                    if capture.push_region(state.source_rect, now, current.region_push_hz) {
                        tracing::trace!(
                            "Pushed source rect {:?} at scale {:.3}",
                            state.source_rect,
                            state.smoothed_scale
                        );
                    }
                    camera_tx.send_replace(Some(state));
                    ticks += 1;
                }

                tracing::debug!("Camera tick stopped after {} ticks", ticks);
                controller
            })
        };

        Self {
            is_running,
            handle: Some(handle),
        }
    }

    /// Stop ticking and wait for the task to exit, returning the controller
    pub async fn stop(&mut self) -> Option<CameraController> {
        self.is_running.store(false, Ordering::SeqCst);

        let handle = self.handle.take()?;
        match handle.await {
            Ok(controller) => Some(controller),
            Err(e) => {
                tracing::warn!("Camera tick task ended abnormally: {}", e);
                None
            }
        }
    }
}

impl Drop for CameraDriver {
    fn drop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
    }
}
