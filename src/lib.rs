//! zoomcast - screen recording with a smart follow-camera.
//!
//! The recorder captures a display (or a selected region of it) and, while
//! the user types, smoothly zooms and pans toward the caret. The platform
//! capture API, the video encoder and the keyboard/accessibility monitor are
//! plugged in through the capability traits in [`capture`], [`encoder`] and
//! [`attention`].

pub mod attention;
pub mod camera;
pub mod capture;
pub mod config;
pub mod encoder;
pub mod recorder;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use recorder::{RecorderDeps, RecordingStateMachine};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging.
///
/// Log level is controlled by `RUST_LOG` (defaults to debug for this crate).
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zoomcast=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging already initialized: {}", e))?;

    tracing::info!("Starting zoomcast v{}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
