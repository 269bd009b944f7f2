//! MJPEG streaming of the shared capture session.

use crate::devices::data::Frame;
use crate::error::{MonitorError, Result};
use crate::session::capture::CaptureManager;
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::{error, info};
use uuid::Uuid;

/// Multipart boundary between frames.
pub const MJPEG_BOUNDARY: &str = "frame";

/// Content type of the video feed response.
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Encode a frame as JPEG at the encoder's default quality.
pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let rgb = frame.to_rgb_bytes();
    let mut jpeg = Vec::new();
    JpegEncoder::new(&mut jpeg)
        .encode(&rgb, frame.width(), frame.height(), ExtendedColorType::Rgb8)
        .map_err(|e| MonitorError::encode_error(format!("JPEG encoding failed: {}", e)))?;
    Ok(jpeg)
}

/// Wrap one JPEG in its multipart framing.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let header = format!("--{MJPEG_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = BytesMut::with_capacity(header.len() + jpeg.len() + 2);
    part.put_slice(header.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// One connected viewer. Dropped when the client goes away.
struct Viewer {
    id: Uuid,
    manager: CaptureManager,
    frames: u64,
}

impl Drop for Viewer {
    fn drop(&mut self) {
        info!(viewer = %self.id, frames = self.frames, "Video viewer disconnected");
    }
}

/// Infinite multipart stream of frames from the shared session.
///
/// Nothing is captured until the stream is polled, and every poll captures
/// and encodes exactly one frame, so the consumer sets the frame rate.
/// Dropping the stream leaves the capture session open for other viewers.
pub fn mjpeg_stream(manager: CaptureManager) -> BoxStream<'static, Bytes> {
    let id = Uuid::new_v4();
    info!(viewer = %id, "Video viewer connected");

    let viewer = Viewer {
        id,
        manager,
        frames: 0,
    };

    stream::unfold(viewer, |mut viewer| async move {
        let manager = viewer.manager.clone();
        let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&manager.acquire())).await;

        match encoded {
            Ok(Ok(jpeg)) => {
                viewer.frames += 1;
                Some((multipart_part(&jpeg), viewer))
            }
            Ok(Err(e)) => {
                error!(viewer = %viewer.id, "Ending video stream: {}", e);
                None
            }
            Err(e) => {
                error!(viewer = %viewer.id, "Capture task failed: {}", e);
                None
            }
        }
    })
    .boxed()
}
