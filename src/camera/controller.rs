//! Follow-camera controller
//!
//! Turns a noisy, intermittent attention signal into a smoothly moving
//! source rectangle. Each tick picks a target (zoomed in on the attention
//! point, or zoomed out on the base region), moves the smoothed scale and
//! position a fixed fraction of the remaining distance toward it, and then
//! clamps the resulting rectangle inside the display.
//!
//! Pure state transitions: no I/O, no clocks. Time only enters through the
//! `dt` passed to [`CameraController::tick`].

use crate::capture::{CaptureRegion, Point, Rect, Size};
use crate::config::ZoomSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Camera state after a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraState {
    /// Current zoom factor, never below 1.0
    pub smoothed_scale: f64,

    /// Current focus center in capture space
    pub target_position: Point,

    /// Area of the display to capture this tick
    pub source_rect: Rect,

    /// Whether the last sample was a live attention point inside the region
    pub is_attention_active: bool,
}

/// Per-recording camera controller
#[derive(Debug, Clone)]
pub struct CameraController {
    display: Size,
    region: CaptureRegion,
    state: CameraState,
    held_target: Option<(f64, Point)>,
    hold_remaining: Duration,
}

impl CameraController {
    /// Create a controller at rest: unzoomed, centered on the base region
    pub fn new(display: Size, region: CaptureRegion) -> Self {
        let base = region.base_rect(display);
        let center = base.center();
        Self {
            display,
            region,
            state: CameraState {
                smoothed_scale: 1.0,
                target_position: center,
                source_rect: clamped_rect(center, base.size, 1.0, display),
                is_attention_active: false,
            },
            held_target: None,
            hold_remaining: Duration::ZERO,
        }
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    pub fn region(&self) -> CaptureRegion {
        self.region
    }

    /// Midpoint of the base region (or the full display)
    pub fn default_center(&self) -> Point {
        self.region.base_rect(self.display).center()
    }

    /// Advance the camera by one tick
    pub fn tick(
        &mut self,
        attention: Option<Point>,
        settings: &ZoomSettings,
        dt: Duration,
    ) -> &CameraState {
        let inside = attention.filter(|point| self.region.contains(*point, settings.edge_margin));

        let (target_scale, target_position) = match inside {
            Some(point) => {
                let target = (settings.magnification.max(1.0), point);
                self.held_target = Some(target);
                self.hold_remaining = settings.release_hold();
                target
            }
            None => match self.held_target {
                Some(held) if !self.hold_remaining.is_zero() => {
                    self.hold_remaining = self.hold_remaining.saturating_sub(dt);
                    held
                }
                _ => {
                    self.held_target = None;
                    (1.0, self.default_center())
                }
            },
        };

        let scale_weight = settings.scale_smoothing.clamp(0.0, 1.0);
        let position_weight = settings.position_smoothing.clamp(0.0, 1.0);

        let state = &mut self.state;
        state.smoothed_scale += (target_scale - state.smoothed_scale) * scale_weight;
        state.smoothed_scale = state.smoothed_scale.max(1.0);
        state.target_position.x += (target_position.x - state.target_position.x) * position_weight;
        state.target_position.y += (target_position.y - state.target_position.y) * position_weight;
        state.is_attention_active = inside.is_some();

        let base = self.region.base_rect(self.display);
        state.source_rect = clamped_rect(
            state.target_position,
            base.size,
            state.smoothed_scale,
            self.display,
        );

        &self.state
    }
}

/// Rectangle of `base / scale` centered on `center`, pushed inside `display`.
///
/// A rectangle larger than the display along an axis collapses to the
/// display extent on that axis.
pub fn clamped_rect(center: Point, base: Size, scale: f64, display: Size) -> Rect {
    let active = base.scaled_down(scale.max(1.0));
    let width = active.width.min(display.width).max(0.0);
    let height = active.height.min(display.height).max(0.0);

    let x = (center.x - width / 2.0).clamp(0.0, (display.width - width).max(0.0));
    let y = (center.y - height / 2.0).clamp(0.0, (display.height - height).max(0.0));

    Rect::new(x, y, width, height)
}
