//! Recorder configuration
//!
//! Zoom tuning and recording options. These are product parameters, not
//! algorithm invariants: everything here is user-adjustable between ticks.

use crate::utils::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Output quality levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl VideoQuality {
    /// Encoded bits per output pixel per frame
    pub fn bits_per_pixel(&self) -> f64 {
        match self {
            VideoQuality::Low => 0.05,
            VideoQuality::Medium => 0.1,
            VideoQuality::High => 0.2,
        }
    }

    /// Target bitrate for a given frame size and rate
    pub fn bitrate(&self, width: u32, height: u32, frame_rate: u32) -> u64 {
        let bits = width as f64 * height as f64 * frame_rate as f64 * self.bits_per_pixel();
        (bits as u64).max(100_000)
    }
}

/// Follow-camera tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZoomSettings {
    /// Zoom factor while the user is typing
    pub magnification: f64,

    /// Per-tick smoothing weight for the zoom factor, in (0, 1]
    pub scale_smoothing: f64,

    /// Per-tick smoothing weight for the pan position, in (0, 1]
    pub position_smoothing: f64,

    /// How long a keystroke keeps the attention signal alive
    pub attention_hold_ms: u64,

    /// How long the last zoom target is held after attention disappears
    pub release_hold_ms: u64,

    /// Slack in points around the capture region for the in-region test
    pub edge_margin: f64,

    /// Output frames per second
    pub frame_rate: u32,

    pub quality: VideoQuality,

    /// Camera tick period
    pub tick_interval_ms: u64,

    /// Maximum source-rectangle pushes per second
    pub region_push_hz: u32,
}

impl Default for ZoomSettings {
    fn default() -> Self {
        Self {
            magnification: 2.0,
            scale_smoothing: 0.08,
            position_smoothing: 0.12,
            attention_hold_ms: 500,
            release_hold_ms: 0,
            edge_margin: 0.0,
            frame_rate: 60,
            quality: VideoQuality::default(),
            tick_interval_ms: 16,
            region_push_hz: 30,
        }
    }
}

impl ZoomSettings {
    /// Reject values outside their documented ranges
    pub fn validate(&self) -> RecorderResult<()> {
        let coefficient_ok = |c: f64| c > 0.0 && c <= 1.0;

        if !(self.magnification >= 1.0) {
            return Err(RecorderError::Configuration(format!(
                "magnification must be at least 1.0, got {}",
                self.magnification
            )));
        }
        if !coefficient_ok(self.scale_smoothing) {
            return Err(RecorderError::Configuration(format!(
                "scaleSmoothing must be in (0, 1], got {}",
                self.scale_smoothing
            )));
        }
        if !coefficient_ok(self.position_smoothing) {
            return Err(RecorderError::Configuration(format!(
                "positionSmoothing must be in (0, 1], got {}",
                self.position_smoothing
            )));
        }
        if !(self.edge_margin >= 0.0) {
            return Err(RecorderError::Configuration(format!(
                "edgeMargin must not be negative, got {}",
                self.edge_margin
            )));
        }
        if self.frame_rate == 0 || self.region_push_hz == 0 || self.tick_interval_ms == 0 {
            return Err(RecorderError::Configuration(
                "frameRate, regionPushHz and tickIntervalMs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp every value into its valid range
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let coefficient = |c: f64, fallback: f64| {
            if c.is_finite() && c > 0.0 {
                c.min(1.0)
            } else {
                fallback
            }
        };

        Self {
            magnification: if self.magnification.is_finite() {
                self.magnification.max(1.0)
            } else {
                defaults.magnification
            },
            scale_smoothing: coefficient(self.scale_smoothing, defaults.scale_smoothing),
            position_smoothing: coefficient(self.position_smoothing, defaults.position_smoothing),
            edge_margin: if self.edge_margin.is_finite() {
                self.edge_margin.max(0.0)
            } else {
                0.0
            },
            frame_rate: self.frame_rate.max(1),
            tick_interval_ms: self.tick_interval_ms.max(1),
            region_push_hz: self.region_push_hz.max(1),
            ..self.clone()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn attention_hold(&self) -> Duration {
        Duration::from_millis(self.attention_hold_ms)
    }

    pub fn release_hold(&self) -> Duration {
        Duration::from_millis(self.release_hold_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

/// Configuration for the recorder as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderConfig {
    /// Where recordings are written (defaults to the user's movies directory)
    pub output_dir: Option<PathBuf>,

    /// Display to record (defaults to the primary display)
    pub display_id: Option<u32>,

    pub zoom: ZoomSettings,

    /// Bounded wait for the encoder to flush on stop
    pub finalize_timeout_ms: u64,

    /// How long the errored state is shown before returning to idle
    pub error_grace_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            display_id: None,
            zoom: ZoomSettings::default(),
            finalize_timeout_ms: 5_000,
            error_grace_ms: 1_500,
        }
    }
}

impl RecorderConfig {
    /// Output directory, falling back to the platform movies directory
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }

    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_millis(self.finalize_timeout_ms)
    }

    pub fn error_grace(&self) -> Duration {
        Duration::from_millis(self.error_grace_ms)
    }
}

/// The user's movies directory, or the home directory, or the working directory
pub fn default_output_dir() -> PathBuf {
    dirs::video_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ZoomSettings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_coefficients() {
        let settings = ZoomSettings {
            scale_smoothing: 0.0,
            ..ZoomSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = ZoomSettings {
            position_smoothing: 1.5,
            ..ZoomSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = ZoomSettings {
            magnification: 0.5,
            ..ZoomSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_sanitized_clamps_into_range() {
        let settings = ZoomSettings {
            magnification: 0.25,
            scale_smoothing: 3.0,
            position_smoothing: -1.0,
            edge_margin: -4.0,
            frame_rate: 0,
            ..ZoomSettings::default()
        }
        .sanitized();

        assert_eq!(settings.magnification, 1.0);
        assert_eq!(settings.scale_smoothing, 1.0);
        assert_eq!(settings.position_smoothing, 0.12);
        assert_eq!(settings.edge_margin, 0.0);
        assert_eq!(settings.frame_rate, 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: ZoomSettings =
            serde_json::from_str(r#"{"magnification": 3.0, "quality": "high"}"#).unwrap();
        assert_eq!(settings.magnification, 3.0);
        assert_eq!(settings.quality, VideoQuality::High);
        assert_eq!(settings.scale_smoothing, 0.08);
    }

    #[test]
    fn test_bitrate_scales_with_quality() {
        let low = VideoQuality::Low.bitrate(1920, 1080, 60);
        let high = VideoQuality::High.bitrate(1920, 1080, 60);
        assert!(high > low);
        assert_eq!(VideoQuality::Medium.bitrate(1920, 1080, 60), 12_441_600);
    }
}
