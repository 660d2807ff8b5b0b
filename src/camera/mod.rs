//! Smart-zoom follow camera

pub mod controller;
pub mod driver;

pub use controller::{clamped_rect, CameraController, CameraState};
pub use driver::CameraDriver;
