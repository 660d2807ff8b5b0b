//! Attention signal
//!
//! Where the user is currently working, as a point in capture space. The
//! camera samples the signal once per tick, so [`AttentionSignalSource::sample`]
//! must return quickly and never block on the platform.

use crate::capture::Point;
use crate::config::ZoomSettings;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Provider of the current attention point
pub trait AttentionSignalSource: Send + Sync {
    /// Last known attention point, or `None` when the user is idle
    fn sample(&self) -> Option<Point>;
}

/// Recency window used when no setting overrides it
pub const DEFAULT_ATTENTION_WINDOW: Duration = Duration::from_millis(500);

/// Keyboard-driven attention: the caret location of the most recent keystroke.
///
/// The platform keyboard/accessibility monitor feeds keystrokes in through
/// [`KeyboardAttention::record_keystroke`]; the signal goes quiet once no key
/// has been pressed for the recency window.
#[derive(Debug)]
pub struct KeyboardAttention {
    window: Mutex<Duration>,
    last: Mutex<Option<(Point, Instant)>>,
}

impl KeyboardAttention {
    pub fn new(window: Duration) -> Self {
        Self {
            window: Mutex::new(window),
            last: Mutex::new(None),
        }
    }

    /// Recency window taken from `attention_hold_ms`
    pub fn from_settings(settings: &ZoomSettings) -> Self {
        Self::new(settings.attention_hold())
    }

    pub fn set_window(&self, window: Duration) {
        *self.window.lock() = window;
    }

    /// Record a keystroke at the caret location, now
    pub fn record_keystroke(&self, caret: Point) {
        self.record_keystroke_at(caret, Instant::now());
    }

    pub fn record_keystroke_at(&self, caret: Point, at: Instant) {
        let mut last = self.last.lock();
        // Late-arriving events never replace a newer one
        if matches!(*last, Some((_, previous)) if previous > at) {
            return;
        }
        *last = Some((caret, at));
    }

    /// Forget the current attention point
    pub fn clear(&self) {
        *self.last.lock() = None;
    }

    pub fn sample_at(&self, now: Instant) -> Option<Point> {
        let window = *self.window.lock();
        let last = *self.last.lock();
        last.and_then(|(point, at)| {
            (now.saturating_duration_since(at) <= window).then_some(point)
        })
    }
}

impl Default for KeyboardAttention {
    fn default() -> Self {
        Self::new(DEFAULT_ATTENTION_WINDOW)
    }
}

impl AttentionSignalSource for KeyboardAttention {
    fn sample(&self) -> Option<Point> {
        self.sample_at(Instant::now())
    }
}

/// Attention source that never reports a point. Recording without follow-zoom.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAttention;

impl AttentionSignalSource for NoAttention {
    fn sample(&self) -> Option<Point> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_expires_after_window() {
        let attention = KeyboardAttention::new(Duration::from_millis(500));
        let t0 = Instant::now();
        attention.record_keystroke_at(Point::new(10.0, 20.0), t0);

        assert_eq!(
            attention.sample_at(t0 + Duration::from_millis(499)),
            Some(Point::new(10.0, 20.0))
        );
        assert_eq!(attention.sample_at(t0 + Duration::from_millis(501)), None);
    }

    #[test]
    fn test_newer_keystroke_wins() {
        let attention = KeyboardAttention::default();
        let t0 = Instant::now();
        attention.record_keystroke_at(Point::new(1.0, 1.0), t0 + Duration::from_millis(10));
        attention.record_keystroke_at(Point::new(2.0, 2.0), t0);

        assert_eq!(
            attention.sample_at(t0 + Duration::from_millis(20)),
            Some(Point::new(1.0, 1.0))
        );

        attention.clear();
        assert_eq!(attention.sample_at(t0 + Duration::from_millis(20)), None);
    }

    #[test]
    fn test_window_is_adjustable() {
        let attention = KeyboardAttention::default();
        let t0 = Instant::now();
        attention.record_keystroke_at(Point::new(5.0, 5.0), t0);
        attention.set_window(Duration::from_secs(2));
        assert!(attention.sample_at(t0 + Duration::from_secs(1)).is_some());

        let settings = ZoomSettings {
            attention_hold_ms: 100,
            ..ZoomSettings::default()
        };
        let short = KeyboardAttention::from_settings(&settings);
        short.record_keystroke_at(Point::new(5.0, 5.0), t0);
        assert!(short.sample_at(t0 + Duration::from_millis(150)).is_none());
        assert!(NoAttention.sample().is_none());
    }
}
