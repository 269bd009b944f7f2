//! Shared application state handed to every handler.

use crate::devices::camera::SystemCameras;
use crate::devices::config::DeviceConfig;
use crate::devices::gpio::open_pins;
use crate::devices::traits::{AudioBackend, CameraProvider, PinDriver};
use crate::devices::SystemAudio;
use crate::session::{CaptureManager, NoiseGenerator, SwitchRegistry};
use std::sync::Arc;
use tracing::{info, warn};

/// The process-wide sessions.
#[derive(Clone)]
pub struct AppState {
    pub capture: CaptureManager,
    pub noise: NoiseGenerator,
    pub audio: Arc<dyn AudioBackend>,
    pub switches: SwitchRegistry,
}

impl AppState {
    /// Wire the sessions to the compiled-in device backends.
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::with_backends(
            config,
            Arc::new(SystemCameras::new(config.clone())),
            Arc::new(SystemAudio),
            open_pins(config.dev_mode),
        )
    }

    /// Wire the sessions to explicit backends.
    pub fn with_backends(
        config: &DeviceConfig,
        cameras: Arc<dyn CameraProvider>,
        audio: Arc<dyn AudioBackend>,
        pins: Box<dyn PinDriver>,
    ) -> Self {
        Self {
            capture: CaptureManager::new(cameras, config.dev_mode),
            noise: NoiseGenerator::new(audio.clone()),
            audio,
            switches: SwitchRegistry::new(&config.switch_pins, pins),
        }
    }

    /// Stop playback, close the camera and switch everything off.
    pub async fn shutdown(&self) {
        let noise = self.noise.clone();
        let capture = self.capture.clone();
        let released = tokio::task::spawn_blocking(move || {
            noise.shutdown();
            capture.release();
        })
        .await;
        if let Err(e) = released {
            warn!("Device shutdown task failed: {}", e);
        }
        self.switches.all_off().await;
        info!("Devices released");
    }
}
