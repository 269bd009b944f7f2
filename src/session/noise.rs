//! White-noise output session.
//!
//! A single render thread owns the output device. The HTTP side only flips
//! atomics; the thread notices on its next block (every 0.1 s).

use crate::devices::data::{PcmFormat, NOISE_BLOCK_FRAMES};
use crate::devices::traits::AudioBackend;
use crate::error::{MonitorError, Result};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Volume used when a request does not name one.
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Clamp a requested volume into `[0, 1]`. NaN becomes silence.
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Fill `block` with uniform noise in `[-volume, volume]`.
pub fn fill_noise_block<R: Rng + ?Sized>(rng: &mut R, volume: f32, block: &mut [f32]) {
    let dist = Uniform::new_inclusive(-1.0f32, 1.0f32);
    for sample in block.iter_mut() {
        *sample = dist.sample(rng) * volume;
    }
}

/// Reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseStatus {
    pub playing: bool,
    pub volume: f32,
    pub device_open: bool,
}

/// Value of `Shared::session` while nothing is playing.
const STOPPED: u64 = 0;

struct Shared {
    backend: Arc<dyn AudioBackend>,
    /// Id of the playing session, or `STOPPED`.
    session: AtomicU64,
    /// Last session id handed out.
    sessions: AtomicU64,
    volume: AtomicU32,
    device_open: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    fn is_playing(&self) -> bool {
        self.session.load(Ordering::Acquire) != STOPPED
    }

    fn is_current(&self, session: u64) -> bool {
        self.session.load(Ordering::Acquire) == session
    }

    /// Mark `session` stopped unless a newer one already replaced it.
    fn end_session(&self, session: u64) -> bool {
        self.session
            .compare_exchange(session, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Process-wide white-noise player.
#[derive(Clone)]
pub struct NoiseGenerator {
    shared: Arc<Shared>,
}

impl NoiseGenerator {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                session: AtomicU64::new(STOPPED),
                sessions: AtomicU64::new(STOPPED),
                volume: AtomicU32::new(DEFAULT_VOLUME.to_bits()),
                device_open: AtomicBool::new(false),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Start playing at `volume` (clamped).
    ///
    /// Returns false, changing nothing, when noise is already playing.
    pub fn start(&self, volume: f32) -> bool {
        let shared = &self.shared;
        let session = shared.sessions.fetch_add(1, Ordering::Relaxed) + 1;
        if shared
            .session
            .compare_exchange(STOPPED, session, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("White noise already playing");
            return false;
        }

        let volume = clamp_volume(volume);
        shared.volume.store(volume.to_bits(), Ordering::Relaxed);

        let mut worker = shared.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = worker.take();
        let thread_shared = shared.clone();
        let spawned = thread::Builder::new()
            .name("white-noise".to_string())
            .spawn(move || {
                if let Some(previous) = previous {
                    if previous.join().is_err() {
                        warn!("Previous white-noise thread panicked");
                    }
                }
                render(&thread_shared, session);
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                info!(volume, "White noise started");
                true
            }
            Err(e) => {
                error!("Failed to spawn white-noise thread: {}", e);
                shared.end_session(session);
                false
            }
        }
    }

    /// Stop playing. The render thread exits after its current block.
    pub fn stop(&self) {
        if self.shared.session.swap(STOPPED, Ordering::AcqRel) != STOPPED {
            info!("White noise stopped");
        }
    }

    /// Set the volume (clamped) and return the stored value.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = clamp_volume(volume);
        self.shared.volume.store(volume.to_bits(), Ordering::Relaxed);
        debug!(volume, "White noise volume set");
        volume
    }

    pub fn volume(&self) -> f32 {
        self.shared.volume()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    /// Whether the render thread currently holds the output device.
    pub fn device_open(&self) -> bool {
        self.shared.device_open.load(Ordering::Acquire)
    }

    pub fn status(&self) -> NoiseStatus {
        NoiseStatus {
            playing: self.is_playing(),
            volume: self.volume(),
            device_open: self.device_open(),
        }
    }

    /// Stop and wait for the render thread to release the device.
    pub fn shutdown(&self) {
        self.stop();
        let handle = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("White-noise thread panicked");
            }
        }
    }
}

/// Marks the device closed however the render loop exits.
struct DeviceOpen<'a>(&'a AtomicBool);

impl Drop for DeviceOpen<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn render(shared: &Shared, session: u64) {
    if !shared.is_current(session) {
        return;
    }

    if let Err(e) = play(shared, session) {
        error!("White noise playback failed: {}", e);
        shared.end_session(session);
    }
}

fn play(shared: &Shared, session: u64) -> Result<()> {
    let mut output = shared.backend.open_output(PcmFormat::MONO_44K)?;
    shared.device_open.store(true, Ordering::Release);
    let _open = DeviceOpen(&shared.device_open);
    debug!("White-noise output device opened");

    let mut rng = rand::thread_rng();
    let mut block = vec![0.0f32; NOISE_BLOCK_FRAMES];
    while shared.is_current(session) {
        fill_noise_block(&mut rng, shared.volume(), &mut block);
        output
            .write(&block)
            .map_err(|e| MonitorError::device_error(format!("output write failed: {}", e)))?;
    }

    drop(output);
    debug!("White-noise output device closed");
    Ok(())
}
