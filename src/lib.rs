//! # Nursery Pi - Raspberry Pi Nursery Monitor
//!
//! A home monitoring endpoint for a Raspberry Pi: live camera video, live
//! microphone audio, a white-noise player and two LED switches, all behind
//! a small HTTP interface.
//!
//! ## Features
//!
//! - **Shared camera session**: every viewer reads from one lazily opened
//!   device; a missing or failing camera degrades to a placeholder frame
//! - **MJPEG video feed**: `multipart/x-mixed-replace` JPEG stream
//! - **Microphone feed**: raw 16-bit PCM, falling back to paced silence
//! - **White noise**: one background render thread, volume adjustable live
//! - **GPIO switches**: named LEDs on BCM pins (feature-gated)
//! - **Development mode**: runs on any machine with webcams, default audio
//!   devices or pure software fallbacks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nursery_pi::{start_web_server, AppState, DeviceConfig, WebConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let devices = DeviceConfig::default().with_dev_mode(true);
//!     let state = AppState::from_config(&devices);
//!
//!     // Start web server on port 8080
//!     start_web_server(WebConfig::new("0.0.0.0", 8080), state).await?;
//!     Ok(())
//! }
//! ```

pub mod devices;
pub mod error;
pub mod session;
pub mod web;

// Re-export public API
pub use devices::{
    config::DeviceConfig,
    data::{Frame, Resolution, SourceKind},
    traits::{AudioBackend, CameraProvider, FrameSource, PinDriver},
};
pub use error::{MonitorError, Result};
pub use session::{
    capture::{CaptureManager, CaptureStatus},
    noise::{NoiseGenerator, NoiseStatus},
    switches::SwitchRegistry,
};
pub use web::{create_app, start_web_server, AppState, WebConfig};

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;
