//! Capture session manager.
//!
//! One camera session is shared by every viewer. It is opened lazily by the
//! first [`CaptureManager::acquire`], reused until [`CaptureManager::release`],
//! and every device interaction happens under a single mutex so at most one
//! read is ever in flight.

use crate::devices::data::{Frame, SourceKind};
use crate::devices::traits::{CameraProvider, FrameSource};
use crate::session::placeholder::placeholder_frame;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Snapshot of the capture session for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    /// Whether a session is currently open
    pub open: bool,
    /// Backing kind of the open session
    pub kind: Option<SourceKind>,
    /// Frames handed out by the current session, placeholders included
    pub frames_captured: u64,
    /// Device reads that failed and were replaced by the placeholder
    pub failed_reads: u64,
}

struct CaptureSession {
    kind: SourceKind,
    source: Option<Box<dyn FrameSource>>,
    frames_captured: u64,
    failed_reads: u64,
    failing: bool,
}

impl CaptureSession {
    fn device(source: Box<dyn FrameSource>) -> Self {
        Self {
            kind: source.kind(),
            source: Some(source),
            frames_captured: 0,
            failed_reads: 0,
            failing: false,
        }
    }

    fn placeholder() -> Self {
        Self {
            kind: SourceKind::Placeholder,
            source: None,
            frames_captured: 0,
            failed_reads: 0,
            failing: false,
        }
    }

    fn read(&mut self) -> Frame {
        self.frames_captured += 1;
        let Some(source) = self.source.as_mut() else {
            return placeholder_frame();
        };

        match source.capture() {
            Ok(frame) => {
                if self.failing {
                    info!(kind = %self.kind, "Camera reads recovered");
                    self.failing = false;
                }
                frame
            }
            Err(e) => {
                self.failed_reads += 1;
                if !self.failing {
                    warn!(kind = %self.kind, "Camera read failed, serving placeholder: {}", e);
                    self.failing = true;
                }
                placeholder_frame()
            }
        }
    }

    fn status(&self) -> CaptureStatus {
        CaptureStatus {
            open: true,
            kind: Some(self.kind),
            frames_captured: self.frames_captured,
            failed_reads: self.failed_reads,
        }
    }
}

struct Inner {
    provider: Arc<dyn CameraProvider>,
    dev_mode: bool,
    session: Mutex<Option<CaptureSession>>,
    status: Mutex<CaptureStatus>,
}

/// Process-wide owner of the camera.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct CaptureManager {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CaptureManager {
    pub fn new(provider: Arc<dyn CameraProvider>, dev_mode: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                dev_mode,
                session: Mutex::new(None),
                status: Mutex::new(CaptureStatus::default()),
            }),
        }
    }

    /// Return the next frame, opening a session if none is open.
    ///
    /// Blocks on the device and never fails: without a usable camera, or
    /// when a read fails, the placeholder frame is returned instead.
    pub fn acquire(&self) -> Frame {
        let mut guard = lock(&self.inner.session);
        let session = guard.get_or_insert_with(|| self.open_session());
        let frame = session.read();
        *lock(&self.inner.status) = session.status();
        frame
    }

    /// Close the session and its device. Safe to call at any time.
    pub fn release(&self) {
        let mut guard = lock(&self.inner.session);
        if let Some(session) = guard.take() {
            // Dropping the source closes the device while the lock is held,
            // so a concurrent acquire cannot open a second handle.
            drop(session);
            info!("Capture session released");
        }
        *lock(&self.inner.status) = CaptureStatus::default();
    }

    pub fn is_open(&self) -> bool {
        lock(&self.inner.status).open
    }

    /// Status as of the last acquire or release. Never waits on the device.
    pub fn status(&self) -> CaptureStatus {
        lock(&self.inner.status).clone()
    }

    fn open_session(&self) -> CaptureSession {
        let provider = &self.inner.provider;

        if self.inner.dev_mode {
            debug!("Development mode, skipping camera module");
        } else if provider.is_available(SourceKind::CameraModule) {
            match provider.open(SourceKind::CameraModule) {
                Ok(source) => {
                    info!(kind = %SourceKind::CameraModule, "Capture session opened");
                    return CaptureSession::device(source);
                }
                Err(e) => warn!("Camera module failed to open: {}", e),
            }
        }

        match provider.open(SourceKind::GenericCamera) {
            Ok(source) => {
                info!(kind = %SourceKind::GenericCamera, "Capture session opened");
                CaptureSession::device(source)
            }
            Err(e) => {
                warn!("No camera available, serving placeholder frames: {}", e);
                CaptureSession::placeholder()
            }
        }
    }
}
