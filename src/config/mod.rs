//! Configuration types and persistence

pub mod schema;
pub mod store;

pub use schema::{default_output_dir, RecorderConfig, VideoQuality, ZoomSettings};
