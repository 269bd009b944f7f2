//! Traits at the boundary between sessions and physical devices.
//!
//! The session layer only talks to hardware through these traits, so every
//! backend (cpal, nokhwa, v4l, rppal) can be swapped for a fake in tests.

use crate::devices::data::{Frame, PcmFormat, SourceKind};
use crate::error::Result;

/// One open camera capable of producing frames on demand.
///
/// Implementations block until a frame is available.
pub trait FrameSource: Send {
    /// Which backend produced this source.
    fn kind(&self) -> SourceKind;

    /// Capture one frame.
    fn capture(&mut self) -> Result<Frame>;
}

/// Opens camera backends for the capture session manager.
pub trait CameraProvider: Send + Sync {
    /// Whether the platform advertises a device of this kind.
    ///
    /// Only consulted for [`SourceKind::CameraModule`]; generic cameras are
    /// always attempted.
    fn is_available(&self, kind: SourceKind) -> bool;

    /// Open and start a device of the given kind.
    fn open(&self, kind: SourceKind) -> Result<Box<dyn FrameSource>>;
}

/// Blocking writer over an open audio output device.
///
/// Dropping the writer closes the device.
pub trait PcmOutput {
    /// Write one block of mono samples in [-1, 1]. Blocks until the device
    /// has accepted the block.
    fn write(&mut self, samples: &[f32]) -> Result<()>;
}

/// Blocking reader over an open audio input device.
///
/// Dropping the reader closes the device.
pub trait PcmInput {
    /// Read exactly `frames` mono 16-bit samples.
    fn read(&mut self, frames: usize) -> Result<Vec<i16>>;
}

/// Opens audio devices.
///
/// Returned handles are used and dropped on the thread that opened them,
/// which is why they are not required to be `Send`.
pub trait AudioBackend: Send + Sync {
    /// Open the output device for rendering.
    fn open_output(&self, format: PcmFormat) -> Result<Box<dyn PcmOutput>>;

    /// Open the input device for capture.
    fn open_input(&self, format: PcmFormat) -> Result<Box<dyn PcmInput>>;
}

/// Drives digital output pins.
pub trait PinDriver: Send {
    /// Configure a pin as an output, driven low.
    fn setup_output(&mut self, pin: u8) -> Result<()>;

    /// Drive a configured pin.
    fn write(&mut self, pin: u8, high: bool) -> Result<()>;
}
