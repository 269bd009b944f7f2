//! Fake devices shared by the integration tests.

#![allow(dead_code)]

use nursery_pi::devices::data::{Frame, PcmFormat, Resolution, SourceKind};
use nursery_pi::devices::traits::{
    AudioBackend, CameraProvider, FrameSource, PcmInput, PcmOutput, PinDriver,
};
use nursery_pi::error::{MonitorError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Open/close and concurrency bookkeeping for a fake device.
#[derive(Debug, Default)]
pub struct DeviceCounters {
    pub opens: AtomicUsize,
    pub open_now: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub operations: AtomicUsize,
}

impl DeviceCounters {
    fn opened(&self) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_now.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.operations.fetch_add(1, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn open_now(&self) -> usize {
        self.open_now.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

pub struct FakeSource {
    kind: SourceKind,
    delay: Duration,
    counters: Arc<DeviceCounters>,
}

impl FrameSource for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn capture(&mut self) -> Result<Frame> {
        self.counters.enter();
        thread::sleep(self.delay);
        self.counters.leave();
        Ok(Frame::filled(Resolution::new(32, 24), [10, 20, 30]))
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        self.counters.closed();
    }
}

/// Camera provider with configurable presence.
pub struct FakeCameras {
    pub module: bool,
    pub generic: bool,
    pub delay: Duration,
    pub counters: Arc<DeviceCounters>,
}

impl FakeCameras {
    pub fn generic() -> Self {
        Self {
            module: false,
            generic: true,
            delay: Duration::from_millis(1),
            counters: Arc::default(),
        }
    }

    pub fn absent() -> Self {
        Self {
            module: false,
            generic: false,
            delay: Duration::ZERO,
            counters: Arc::default(),
        }
    }
}

impl CameraProvider for FakeCameras {
    fn is_available(&self, kind: SourceKind) -> bool {
        kind == SourceKind::CameraModule && self.module
    }

    fn open(&self, kind: SourceKind) -> Result<Box<dyn FrameSource>> {
        let present = match kind {
            SourceKind::CameraModule => self.module,
            SourceKind::GenericCamera => self.generic,
            SourceKind::Placeholder => false,
        };
        if !present {
            return Err(MonitorError::device_unavailable("no camera"));
        }
        self.counters.opened();
        Ok(Box::new(FakeSource {
            kind,
            delay: self.delay,
            counters: self.counters.clone(),
        }))
    }
}

pub struct FakeOutput {
    counters: Arc<DeviceCounters>,
}

impl PcmOutput for FakeOutput {
    fn write(&mut self, _samples: &[f32]) -> Result<()> {
        self.counters.enter();
        thread::sleep(Duration::from_millis(5));
        self.counters.leave();
        Ok(())
    }
}

impl Drop for FakeOutput {
    fn drop(&mut self) {
        self.counters.closed();
    }
}

pub struct FakeInput {
    value: i16,
    fail_after: Option<usize>,
    reads: usize,
    counters: Arc<DeviceCounters>,
}

impl PcmInput for FakeInput {
    fn read(&mut self, frames: usize) -> Result<Vec<i16>> {
        self.reads += 1;
        if self.fail_after.is_some_and(|n| self.reads > n) {
            return Err(MonitorError::device_error("overrun"));
        }
        self.counters.enter();
        thread::sleep(Duration::from_millis(2));
        self.counters.leave();
        Ok(vec![self.value; frames])
    }
}

impl Drop for FakeInput {
    fn drop(&mut self) {
        self.counters.closed();
    }
}

/// Audio backend with configurable presence.
pub struct FakeAudio {
    pub output: bool,
    pub input: bool,
    pub input_value: i16,
    pub input_fail_after: Option<usize>,
    pub output_counters: Arc<DeviceCounters>,
    pub input_counters: Arc<DeviceCounters>,
}

impl FakeAudio {
    pub fn present() -> Self {
        Self {
            output: true,
            input: true,
            input_value: 7,
            input_fail_after: None,
            output_counters: Arc::default(),
            input_counters: Arc::default(),
        }
    }

    pub fn absent() -> Self {
        Self {
            output: false,
            input: false,
            ..Self::present()
        }
    }
}

impl AudioBackend for FakeAudio {
    fn open_output(&self, _format: PcmFormat) -> Result<Box<dyn PcmOutput>> {
        if !self.output {
            return Err(MonitorError::device_unavailable("no speaker"));
        }
        self.output_counters.opened();
        Ok(Box::new(FakeOutput {
            counters: self.output_counters.clone(),
        }))
    }

    fn open_input(&self, format: PcmFormat) -> Result<Box<dyn PcmInput>> {
        assert_eq!(format, PcmFormat::MONO_44K);
        if !self.input {
            return Err(MonitorError::device_unavailable("no microphone"));
        }
        self.input_counters.opened();
        Ok(Box::new(FakeInput {
            value: self.input_value,
            fail_after: self.input_fail_after,
            reads: 0,
            counters: self.input_counters.clone(),
        }))
    }
}

/// Pin driver that records every write.
#[derive(Clone, Default)]
pub struct RecordingPins {
    pub writes: Arc<Mutex<Vec<(u8, bool)>>>,
}

impl PinDriver for RecordingPins {
    fn setup_output(&mut self, pin: u8) -> Result<()> {
        self.writes.lock().unwrap().push((pin, false));
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<()> {
        self.writes.lock().unwrap().push((pin, high));
        Ok(())
    }
}

/// Poll `condition` for up to two seconds.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Async variant of [`wait_until`] that yields to the runtime between polls.
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}
