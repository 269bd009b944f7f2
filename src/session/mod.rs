//! Sessions over the shared devices.
//!
//! These types own the policy: who may hold a device, when it opens and
//! closes, and what a consumer gets when the device is missing.

pub mod capture;
pub mod microphone;
pub mod noise;
pub mod placeholder;
pub mod switches;
pub mod video;

pub use capture::{CaptureManager, CaptureStatus};
pub use noise::{NoiseGenerator, NoiseStatus};
pub use switches::SwitchRegistry;
