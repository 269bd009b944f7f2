//! Device backends.
//!
//! Cameras, audio devices and GPIO pins, each behind a trait from [`traits`]
//! with an optional native backend selected by cargo feature:
//!
//! | feature         | backend                        |
//! |-----------------|--------------------------------|
//! | `camera-module` | V4L2 ribbon camera (`v4l`)     |
//! | `camera`        | generic webcams (`nokhwa`)     |
//! | `audio`         | speaker and microphone (`cpal`)|
//! | `gpio`          | Raspberry Pi pins (`rppal`)    |
//!
//! Without a feature the matching device simply reports itself unavailable.

pub mod audio;
pub mod camera;
pub mod config;
pub mod data;
pub mod gpio;
pub mod traits;

pub use audio::SystemAudio;
pub use camera::SystemCameras;
pub use config::DeviceConfig;
pub use data::{Frame, PcmFormat, Resolution, SourceKind};
pub use traits::{AudioBackend, CameraProvider, FrameSource, PcmInput, PcmOutput, PinDriver};
