//! Screen geometry and coordinate conventions
//!
//! The core works exclusively in capture space: top-left origin, in display
//! points. Region selections drawn in window space (bottom-left origin) are
//! converted exactly once, in [`Selection::resolve`], before they reach the
//! camera controller or the capture configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Divide both dimensions by `factor`
    pub fn scaled_down(self, factor: f64) -> Self {
        Self {
            width: self.width / factor,
            height: self.height / factor,
        }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self {
            origin: Point::default(),
            size,
        }
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y + self.size.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }

    /// Inclusive containment test
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.min_x()
            && point.x <= self.max_x()
            && point.y >= self.min_y()
            && point.y <= self.max_y()
    }

    /// Whether `self` lies entirely inside `bounds`
    pub fn is_within(&self, bounds: &Rect) -> bool {
        self.min_x() >= bounds.min_x()
            && self.min_y() >= bounds.min_y()
            && self.max_x() <= bounds.max_x()
            && self.max_y() <= bounds.max_y()
    }

    /// Grow (or shrink, for negative values) the rectangle on every side
    pub fn inset_by(&self, amount: f64) -> Rect {
        Rect::new(
            self.origin.x + amount,
            self.origin.y + amount,
            (self.size.width - 2.0 * amount).max(0.0),
            (self.size.height - 2.0 * amount).max(0.0),
        )
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.min_x().max(other.min_x());
        let top = self.min_y().max(other.min_y());
        let right = self.max_x().min(other.max_x());
        let bottom = self.max_y().min(other.max_y());
        if right <= left || bottom <= top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }
}

/// Flip a window-space (bottom-left origin) rectangle into capture space.
fn flip_rect(rect: Rect, display_height: f64) -> Rect {
    Rect::new(
        rect.origin.x,
        display_height - rect.origin.y - rect.size.height,
        rect.size.width,
        rect.size.height,
    )
}

/// Flip a window-space point into capture space.
pub fn flip_point(point: Point, display_height: f64) -> Point {
    Point::new(point.x, display_height - point.y)
}

/// A region selection as handed over by the UI layer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "space", content = "rect", rename_all = "camelCase")]
pub enum Selection {
    /// Capture the whole display
    #[default]
    FullScreen,
    /// Rectangle already in capture space
    TopLeft(Rect),
    /// Rectangle in window space, as drawn by the selection overlay
    BottomLeft(Rect),
}

impl Selection {
    /// Convert into a capture-space region for a display of `display` size.
    ///
    /// The selection is clipped to the display; a selection that misses the
    /// display entirely falls back to full screen.
    pub fn resolve(&self, display: Size) -> CaptureRegion {
        let rect = match *self {
            Selection::FullScreen => return CaptureRegion::FullScreen,
            Selection::TopLeft(rect) => rect,
            Selection::BottomLeft(rect) => flip_rect(rect, display.height),
        };

        match rect.intersection(&Rect::from_size(display)) {
            Some(clipped) => CaptureRegion::Area(clipped),
            None => {
                let (width, height) = (display.width, display.height);
                tracing::warn!(
                    "Selected region {:?} is outside the {}x{} display, capturing full screen",
                    rect,
                    width,
                    height
                );
                CaptureRegion::FullScreen
            }
        }
    }
}

/// The base area the camera zooms within, in capture space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CaptureRegion {
    #[default]
    FullScreen,
    Area(Rect),
}

impl CaptureRegion {
    /// The base rectangle for a display of the given size
    pub fn base_rect(&self, display: Size) -> Rect {
        match self {
            CaptureRegion::FullScreen => Rect::from_size(display),
            CaptureRegion::Area(rect) => *rect,
        }
    }

    /// Whether `point` counts as inside the region, allowing `margin` points of slack.
    ///
    /// Full screen accepts every point.
    pub fn contains(&self, point: Point, margin: f64) -> bool {
        match self {
            CaptureRegion::FullScreen => true,
            CaptureRegion::Area(rect) => rect.inset_by(-margin).contains(point),
        }
    }
}
