//! Data structures shared between device backends and sessions.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Preview resolution requested from every camera backend.
pub const DEFAULT_RESOLUTION: Resolution = Resolution {
    width: 640,
    height: 480,
};

/// Sample rate used for both noise output and microphone capture.
pub const SAMPLE_RATE: u32 = 44_100;

/// Frames per white-noise block (1/10 second at [`SAMPLE_RATE`]).
pub const NOISE_BLOCK_FRAMES: usize = (SAMPLE_RATE / 10) as usize;

/// Frames per microphone chunk.
pub const MIC_CHUNK_FRAMES: usize = 1024;

/// Bytes per microphone chunk (16-bit mono).
pub const MIC_CHUNK_BYTES: usize = MIC_CHUNK_FRAMES * 2;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bytes in a BGR8 frame of this size.
    pub fn bgr_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Backing kind of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Dedicated camera module (CSI ribbon camera)
    CameraModule,
    /// Generic indexed camera (USB webcam, laptop camera)
    GenericCamera,
    /// No camera; placeholder frames only
    Placeholder,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::CameraModule => "camera module",
            SourceKind::GenericCamera => "generic camera",
            SourceKind::Placeholder => "placeholder",
        };
        f.write_str(name)
    }
}

/// A single raster image in BGR byte order.
///
/// Frames only exist between a capture call and the JPEG encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    resolution: Resolution,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap BGR8 bytes. Fails when the buffer does not match the dimensions.
    pub fn from_bgr(resolution: Resolution, data: Vec<u8>) -> Result<Self> {
        if data.len() != resolution.bgr_len() {
            return Err(MonitorError::device_error(format!(
                "frame buffer is {} bytes, expected {} for {}",
                data.len(),
                resolution.bgr_len(),
                resolution
            )));
        }
        Ok(Self { resolution, data })
    }

    /// Convert RGB8 bytes (as delivered by most capture APIs) into a frame.
    pub fn from_rgb(resolution: Resolution, mut data: Vec<u8>) -> Result<Self> {
        swap_red_blue(&mut data);
        Self::from_bgr(resolution, data)
    }

    /// A frame filled with a single BGR colour.
    pub fn filled(resolution: Resolution, bgr: [u8; 3]) -> Self {
        let data = bgr
            .iter()
            .copied()
            .cycle()
            .take(resolution.bgr_len())
            .collect();
        Self { resolution, data }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn width(&self) -> u32 {
        self.resolution.width
    }

    pub fn height(&self) -> u32 {
        self.resolution.height
    }

    /// Raw BGR bytes, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the BGR pixel at `(x, y)`.
    pub(crate) fn pixel_mut(&mut self, x: u32, y: u32) -> Option<&mut [u8]> {
        if x >= self.resolution.width || y >= self.resolution.height {
            return None;
        }
        let offset = (y as usize * self.resolution.width as usize + x as usize) * 3;
        self.data.get_mut(offset..offset + 3)
    }

    /// Copy of the pixel data in RGB order, for encoders that expect it.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut rgb = self.data.clone();
        swap_red_blue(&mut rgb);
        rgb
    }
}

fn swap_red_blue(data: &mut [u8]) {
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

/// PCM stream parameters requested from an audio backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    /// 44.1 kHz mono, used for both directions.
    pub const MONO_44K: PcmFormat = PcmFormat {
        sample_rate: SAMPLE_RATE,
        channels: 1,
    };
}

/// Device description returned by the listing helpers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_round_trip_swaps_channels() {
        let res = Resolution::new(2, 1);
        let frame = Frame::from_rgb(res, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(frame.as_bytes(), &[3, 2, 1, 6, 5, 4]);
        assert_eq!(frame.to_rgb_bytes(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_frame_size_mismatch_is_rejected() {
        let res = Resolution::new(4, 4);
        let err = Frame::from_bgr(res, vec![0; 10]).unwrap_err();
        assert!(matches!(err, MonitorError::Device(_)));
    }

    #[test]
    fn test_pixel_bounds() {
        let mut frame = Frame::filled(Resolution::new(3, 2), [9, 8, 7]);
        assert_eq!(frame.pixel_mut(2, 1).map(|p| p.to_vec()), Some(vec![9, 8, 7]));
        assert!(frame.pixel_mut(3, 0).is_none());
        assert!(frame.pixel_mut(0, 2).is_none());
    }

    #[test]
    fn test_block_constants() {
        assert_eq!(NOISE_BLOCK_FRAMES, 4410);
        assert_eq!(MIC_CHUNK_BYTES, 2048);
        assert_eq!(DEFAULT_RESOLUTION.bgr_len(), 640 * 480 * 3);
    }
}
