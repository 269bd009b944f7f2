//! Camera backends.
//!
//! Capture libraries hand out device objects that must stay on the thread
//! that created them. [`ThreadedSource`] owns such a device on a dedicated
//! thread and exposes it as a `Send` [`FrameSource`]; the concrete readers
//! (nokhwa for generic cameras, v4l for the camera module) are feature-gated
//! so the crate builds on machines without the native libraries.

use crate::devices::config::DeviceConfig;
use crate::devices::data::{DeviceInfo, Frame, SourceKind};
use crate::devices::traits::{CameraProvider, FrameSource};
use crate::error::{MonitorError, Result};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, warn};

/// Reads frames from a device owned by the current thread.
pub trait FrameReader {
    fn read_frame(&mut self) -> Result<Frame>;
}

/// A frame source whose device lives on its own thread.
///
/// Each [`FrameSource::capture`] call is a request/response round trip with
/// the device thread. Dropping the source closes the request channel; the
/// thread then drops the reader (closing the device) and is joined.
pub struct ThreadedSource {
    kind: SourceKind,
    requests: Option<mpsc::SyncSender<()>>,
    frames: mpsc::Receiver<Result<Frame>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ThreadedSource {
    /// Spawn a device thread and run `opener` on it.
    ///
    /// Returns once the device is open, or with the opener's error.
    pub fn spawn<F>(kind: SourceKind, name: &str, opener: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn FrameReader>> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::sync_channel::<()>(0);
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Result<Frame>>(1);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut reader = match opener() {
                    Ok(reader) => {
                        let _ = ready_tx.send(Ok(()));
                        reader
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while request_rx.recv().is_ok() {
                    if frame_tx.send(reader.read_frame()).is_err() {
                        break;
                    }
                }

                drop(reader);
                debug!(%kind, "Camera thread finished, device closed");
            })
            .map_err(|e| {
                MonitorError::device_unavailable(format!("failed to spawn camera thread: {e}"))
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                kind,
                requests: Some(request_tx),
                frames: frame_rx,
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(MonitorError::device_unavailable(
                    "camera thread exited while opening the device",
                ))
            }
        }
    }
}

impl FrameSource for ThreadedSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn capture(&mut self) -> Result<Frame> {
        let requests = self
            .requests
            .as_ref()
            .ok_or_else(|| MonitorError::device_error("camera thread already stopped"))?;
        requests
            .send(())
            .map_err(|_| MonitorError::device_error("camera thread stopped"))?;
        self.frames
            .recv()
            .map_err(|_| MonitorError::device_error("camera thread stopped mid-capture"))?
    }
}

impl Drop for ThreadedSource {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(kind = %self.kind, "Camera thread panicked");
            }
        }
    }
}

/// Camera provider backed by the compiled-in capture libraries.
pub struct SystemCameras {
    config: DeviceConfig,
}

impl SystemCameras {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }
}

impl CameraProvider for SystemCameras {
    fn is_available(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::CameraModule => {
                cfg!(feature = "camera-module") && self.config.camera_device.exists()
            }
            SourceKind::GenericCamera => cfg!(feature = "camera"),
            SourceKind::Placeholder => false,
        }
    }

    fn open(&self, kind: SourceKind) -> Result<Box<dyn FrameSource>> {
        match kind {
            SourceKind::CameraModule => self.open_camera_module(),
            SourceKind::GenericCamera => self.open_generic(),
            SourceKind::Placeholder => Err(MonitorError::config_error(
                "placeholder frames are not backed by a device",
            )),
        }
    }
}

impl SystemCameras {
    #[cfg(feature = "camera-module")]
    fn open_camera_module(&self) -> Result<Box<dyn FrameSource>> {
        let path = self.config.camera_device.clone();
        let resolution = self.config.resolution;
        tracing::info!(device = %path.display(), %resolution, "Opening camera module");
        let source = ThreadedSource::spawn(SourceKind::CameraModule, "camera-module", move || {
            module::ModuleReader::open(&path, resolution)
                .map(|reader| Box::new(reader) as Box<dyn FrameReader>)
        })?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "camera-module"))]
    fn open_camera_module(&self) -> Result<Box<dyn FrameSource>> {
        Err(MonitorError::device_unavailable(
            "camera module support not compiled in (enable the `camera-module` feature)",
        ))
    }

    #[cfg(feature = "camera")]
    fn open_generic(&self) -> Result<Box<dyn FrameSource>> {
        let index = self.config.camera_index;
        let resolution = self.config.resolution;
        tracing::info!(index, "Opening generic camera");
        let source = ThreadedSource::spawn(SourceKind::GenericCamera, "camera-generic", move || {
            generic::GenericReader::open(index, resolution)
                .map(|reader| Box::new(reader) as Box<dyn FrameReader>)
        })?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "camera"))]
    fn open_generic(&self) -> Result<Box<dyn FrameSource>> {
        Err(MonitorError::device_unavailable(
            "generic camera support not compiled in (enable the `camera` feature)",
        ))
    }
}

/// List the generic cameras the capture library can see.
#[cfg(feature = "camera")]
pub fn list_cameras() -> Result<Vec<DeviceInfo>> {
    use nokhwa::utils::ApiBackend;

    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| MonitorError::device_unavailable(format!("failed to query cameras: {e}")))?;

    Ok(cameras
        .iter()
        .enumerate()
        .map(|(idx, camera)| DeviceInfo {
            id: camera.index().as_string(),
            name: camera.human_name(),
            is_default: idx == 0,
        })
        .collect())
}

/// List the generic cameras the capture library can see.
#[cfg(not(feature = "camera"))]
pub fn list_cameras() -> Result<Vec<DeviceInfo>> {
    Ok(Vec::new())
}

#[cfg(feature = "camera")]
mod generic {
    use super::FrameReader;
    use crate::devices::data::{Frame, Resolution};
    use crate::error::{MonitorError, Result};
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution as CameraResolution,
    };
    use nokhwa::Camera;
    use tracing::{info, warn};

    /// Generic camera opened through nokhwa.
    pub(super) struct GenericReader {
        camera: Camera,
    }

    impl GenericReader {
        pub(super) fn open(index: u32, resolution: Resolution) -> Result<Self> {
            let target = CameraFormat::new(
                CameraResolution::new(resolution.width, resolution.height),
                FrameFormat::MJPEG,
                30,
            );
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(target));

            let mut camera = Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
                MonitorError::device_unavailable(format!("failed to open camera {index}: {e}"))
            })?;
            camera.open_stream().map_err(|e| {
                MonitorError::device_unavailable(format!("failed to start camera {index}: {e}"))
            })?;

            let actual = camera.resolution();
            info!(
                index,
                width = actual.width(),
                height = actual.height(),
                "Generic camera streaming"
            );
            Ok(Self { camera })
        }
    }

    impl FrameReader for GenericReader {
        fn read_frame(&mut self) -> Result<Frame> {
            let buffer = self
                .camera
                .frame()
                .map_err(|e| MonitorError::device_error(format!("camera read failed: {e}")))?;
            let image = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| MonitorError::device_error(format!("camera decode failed: {e}")))?;
            let resolution = Resolution::new(image.width(), image.height());
            Frame::from_rgb(resolution, image.into_raw())
        }
    }

    impl Drop for GenericReader {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                warn!("Failed to stop camera stream: {e}");
            }
        }
    }
}

#[cfg(feature = "camera-module")]
mod module {
    use super::FrameReader;
    use crate::devices::data::{Frame, Resolution};
    use crate::error::{MonitorError, Result};
    use std::path::Path;
    use tracing::info;
    use v4l::buffer::Type;
    use v4l::io::mmap::Stream as MmapStream;
    use v4l::io::traits::CaptureStream;
    use v4l::video::Capture;
    use v4l::{Device, FourCC};

    /// Camera module opened through V4L2, configured once at open time.
    pub(super) struct ModuleReader {
        // Declared before `_device` so streaming stops before the node closes.
        stream: MmapStream<'static>,
        _device: Device,
        resolution: Resolution,
    }

    impl ModuleReader {
        pub(super) fn open(path: &Path, resolution: Resolution) -> Result<Self> {
            let device = Device::with_path(path).map_err(|e| {
                MonitorError::device_unavailable(format!(
                    "failed to open {}: {e}",
                    path.display()
                ))
            })?;

            let rgb24 = FourCC::new(b"RGB3");
            let mut format = device
                .format()
                .map_err(|e| MonitorError::device_unavailable(format!("failed to query format: {e}")))?;
            format.width = resolution.width;
            format.height = resolution.height;
            format.fourcc = rgb24;

            let format = device
                .set_format(&format)
                .map_err(|e| MonitorError::device_unavailable(format!("failed to set format: {e}")))?;
            if format.fourcc != rgb24 {
                return Err(MonitorError::device_unavailable(format!(
                    "camera module refused RGB24 (offered {})",
                    format.fourcc
                )));
            }
            let resolution = Resolution::new(format.width, format.height);

            let stream = MmapStream::with_buffers(&device, Type::VideoCapture, 4).map_err(|e| {
                MonitorError::device_unavailable(format!("failed to start streaming: {e}"))
            })?;

            info!(%resolution, "Camera module configured and streaming");
            Ok(Self {
                stream,
                _device: device,
                resolution,
            })
        }
    }

    impl FrameReader for ModuleReader {
        fn read_frame(&mut self) -> Result<Frame> {
            let (buf, _meta) = self
                .stream
                .next()
                .map_err(|e| MonitorError::device_error(format!("camera module read failed: {e}")))?;
            let len = self.resolution.bgr_len().min(buf.len());
            Frame::from_rgb(self.resolution, buf[..len].to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::data::Resolution;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingReader {
        reads: usize,
        open: Arc<AtomicUsize>,
    }

    impl FrameReader for CountingReader {
        fn read_frame(&mut self) -> Result<Frame> {
            self.reads += 1;
            if self.reads == 2 {
                return Err(MonitorError::device_error("dropped frame"));
            }
            Ok(Frame::filled(Resolution::new(2, 2), [self.reads as u8, 0, 0]))
        }
    }

    impl Drop for CountingReader {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_threaded_source_round_trip_and_close() {
        let open = Arc::new(AtomicUsize::new(0));
        let counter = open.clone();
        let mut source = ThreadedSource::spawn(SourceKind::GenericCamera, "test-camera", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingReader { reads: 0, open: counter }) as Box<dyn FrameReader>)
        })
        .unwrap();

        assert_eq!(source.kind(), SourceKind::GenericCamera);
        assert_eq!(open.load(Ordering::SeqCst), 1);
        assert_eq!(source.capture().unwrap().as_bytes()[0], 1);
        assert!(source.capture().is_err());
        assert_eq!(source.capture().unwrap().as_bytes()[0], 3);

        drop(source);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_threaded_source_open_failure() {
        let result = ThreadedSource::spawn(SourceKind::CameraModule, "test-camera", || {
            Err(MonitorError::device_unavailable("no such device"))
        });
        assert!(matches!(result, Err(MonitorError::DeviceUnavailable(_))));
    }

    #[test]
    fn test_system_cameras_never_offer_placeholder() {
        let cameras = SystemCameras::new(DeviceConfig::default());
        assert!(!cameras.is_available(SourceKind::Placeholder));
        assert!(cameras.open(SourceKind::Placeholder).is_err());
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_generic_camera_unavailable_without_feature() {
        let cameras = SystemCameras::new(DeviceConfig::default());
        let err = cameras.open(SourceKind::GenericCamera).err().unwrap();
        assert!(err.is_unavailable());
        assert!(list_cameras().unwrap().is_empty());
    }
}
