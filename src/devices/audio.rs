//! Audio backends.
//!
//! cpal is callback driven while the sessions want blocking `write`/`read`
//! calls that pace themselves against the device. [`SampleRing`] bridges the
//! two: the session thread blocks on a bounded queue, the device callback
//! drains or fills it.

use crate::devices::data::{DeviceInfo, PcmFormat};
use crate::devices::traits::{AudioBackend, PcmInput, PcmOutput};
use crate::error::{MonitorError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

/// How long a blocking write or read waits for the device before failing.
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(2);

/// Bounded sample queue shared between a session thread and a device callback.
pub struct SampleRing<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Condvar,
    failed: AtomicBool,
    capacity: usize,
}

impl<T: Copy + Default> SampleRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Condvar::new(),
            failed: AtomicBool::new(false),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of queued samples.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark the device as failed and wake any blocked caller.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::Release);
        self.ready.notify_all();
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Queue `samples`, blocking while the ring is too full to take them.
    ///
    /// A block larger than the capacity is accepted once the ring is empty.
    pub fn write(&self, samples: &[T], timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        loop {
            if self.has_failed() {
                return Err(MonitorError::device_error("audio output stream failed"));
            }
            if queue.is_empty() || queue.len() + samples.len() <= self.capacity {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(MonitorError::device_error("audio output device stalled"));
            }
            queue = self
                .ready
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        queue.extend(samples.iter().copied());
        Ok(())
    }

    /// Take exactly `count` samples, blocking until they are available.
    pub fn read(&self, count: usize, timeout: Duration) -> Result<Vec<T>> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.lock();
        while queue.len() < count {
            if self.has_failed() {
                return Err(MonitorError::device_error("audio input stream failed"));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(MonitorError::device_error("no samples from audio input device"));
            }
            queue = self
                .ready
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(queue.drain(..count).collect())
    }

    /// Fill `out` from the front of the queue, padding with `T::default()`.
    ///
    /// Never blocks; returns false (leaving `out` untouched) when the queue
    /// is busy. Meant for realtime device callbacks.
    pub fn try_pop_into(&self, out: &mut [T]) -> bool {
        let mut queue = match self.queue.try_lock() {
            Ok(queue) => queue,
            Err(_) => return false,
        };
        for slot in out.iter_mut() {
            *slot = queue.pop_front().unwrap_or_default();
        }
        drop(queue);
        self.ready.notify_all();
        true
    }

    /// Append samples, discarding the oldest ones beyond capacity.
    ///
    /// Never blocks: if a reader holds the lock the samples are dropped and
    /// false is returned.
    pub fn try_push_overwrite(&self, samples: impl IntoIterator<Item = T>) -> bool {
        let mut queue = match self.queue.try_lock() {
            Ok(queue) => queue,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        queue.extend(samples);
        let excess = queue.len().saturating_sub(self.capacity);
        if excess > 0 {
            queue.drain(..excess);
        }
        drop(queue);
        self.ready.notify_all();
        true
    }
}

/// Audio backend using the compiled-in audio library.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAudio;

impl AudioBackend for SystemAudio {
    #[cfg(feature = "audio")]
    fn open_output(&self, format: PcmFormat) -> Result<Box<dyn PcmOutput>> {
        Ok(Box::new(cpal_backend::CpalOutput::open(format)?))
    }

    #[cfg(not(feature = "audio"))]
    fn open_output(&self, _format: PcmFormat) -> Result<Box<dyn PcmOutput>> {
        Err(MonitorError::device_unavailable(
            "audio support not compiled in (enable the `audio` feature)",
        ))
    }

    #[cfg(feature = "audio")]
    fn open_input(&self, format: PcmFormat) -> Result<Box<dyn PcmInput>> {
        Ok(Box::new(cpal_backend::CpalInput::open(format)?))
    }

    #[cfg(not(feature = "audio"))]
    fn open_input(&self, _format: PcmFormat) -> Result<Box<dyn PcmInput>> {
        Err(MonitorError::device_unavailable(
            "audio support not compiled in (enable the `audio` feature)",
        ))
    }
}

/// List audio output devices.
#[cfg(feature = "audio")]
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    cpal_backend::list_devices(true)
}

/// List audio output devices.
#[cfg(not(feature = "audio"))]
pub fn list_output_devices() -> Result<Vec<DeviceInfo>> {
    Ok(Vec::new())
}

/// List audio input devices.
#[cfg(feature = "audio")]
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    cpal_backend::list_devices(false)
}

/// List audio input devices.
#[cfg(not(feature = "audio"))]
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    Ok(Vec::new())
}

#[cfg(feature = "audio")]
mod cpal_backend {
    use super::{SampleRing, DEVICE_TIMEOUT};
    use crate::devices::data::{DeviceInfo, PcmFormat, NOISE_BLOCK_FRAMES, SAMPLE_RATE};
    use crate::devices::traits::{PcmInput, PcmOutput};
    use crate::error::{MonitorError, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, Host, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfig};
    use std::sync::Arc;
    use tracing::{debug, error, info, warn};

    /// Two noise blocks of buffering between the render thread and the device.
    const OUTPUT_CAPACITY: usize = NOISE_BLOCK_FRAMES * 2;

    /// One second of microphone audio before old samples are dropped.
    const INPUT_CAPACITY: usize = SAMPLE_RATE as usize;

    fn select_device(host: &Host, output: bool) -> Result<Device> {
        let default = if output {
            host.default_output_device()
        } else {
            host.default_input_device()
        };
        if let Some(device) = default {
            return Ok(device);
        }

        let direction = if output { "output" } else { "input" };
        warn!("No default {direction} device, scanning all devices");

        let devices = host
            .devices()
            .map_err(|e| MonitorError::device_unavailable(format!("failed to enumerate devices: {e}")))?;
        for device in devices {
            let capable = if output {
                device
                    .supported_output_configs()
                    .map(|mut configs| configs.next().is_some())
                    .unwrap_or(false)
            } else {
                device
                    .supported_input_configs()
                    .map(|mut configs| configs.next().is_some())
                    .unwrap_or(false)
            };
            if capable {
                return Ok(device);
            }
        }

        Err(MonitorError::device_unavailable(format!(
            "no audio {direction} device found"
        )))
    }

    fn select_config(device: &Device, format: PcmFormat, output: bool) -> Result<SupportedStreamConfig> {
        let ranges: Vec<_> = if output {
            device
                .supported_output_configs()
                .map_err(|e| MonitorError::device_unavailable(format!("failed to get output configs: {e}")))?
                .collect()
        } else {
            device
                .supported_input_configs()
                .map_err(|e| MonitorError::device_unavailable(format!("failed to get input configs: {e}")))?
                .collect()
        };

        let rate = format.sample_rate;
        let mut fallback = None;
        for range in ranges {
            if range.min_sample_rate().0 <= rate && range.max_sample_rate().0 >= rate {
                if range.channels() == format.channels {
                    return Ok(range.with_sample_rate(SampleRate(rate)));
                }
                if fallback.is_none() {
                    fallback = Some(range.with_sample_rate(SampleRate(rate)));
                }
            }
        }
        if let Some(config) = fallback {
            return Ok(config);
        }

        let config = if output {
            device.default_output_config()
        } else {
            device.default_input_config()
        }
        .map_err(|e| MonitorError::device_unavailable(format!("failed to get default config: {e}")))?;
        warn!(
            requested = rate,
            actual = config.sample_rate().0,
            "Device does not support the requested sample rate"
        );
        Ok(config)
    }

    /// Output device handle. Dropping it stops and closes the stream.
    pub(super) struct CpalOutput {
        _stream: Stream,
        ring: Arc<SampleRing<f32>>,
    }

    impl CpalOutput {
        pub(super) fn open(format: PcmFormat) -> Result<Self> {
            let host = cpal::default_host();
            let device = select_device(&host, true)?;
            let name = device.name().unwrap_or_else(|_| "Unknown".into());
            let supported = select_config(&device, format, true)?;
            let sample_format = supported.sample_format();
            let config: StreamConfig = supported.into();

            debug!(
                device = %name,
                sample_rate = config.sample_rate.0,
                channels = config.channels,
                ?sample_format,
                "Opening audio output"
            );

            let ring = Arc::new(SampleRing::new(OUTPUT_CAPACITY));
            let stream = match sample_format {
                SampleFormat::F32 => build_output::<f32>(&device, &config, ring.clone())?,
                SampleFormat::F64 => build_output::<f64>(&device, &config, ring.clone())?,
                SampleFormat::I16 => build_output::<i16>(&device, &config, ring.clone())?,
                SampleFormat::I32 => build_output::<i32>(&device, &config, ring.clone())?,
                SampleFormat::U16 => build_output::<u16>(&device, &config, ring.clone())?,
                SampleFormat::U8 => build_output::<u8>(&device, &config, ring.clone())?,
                other => {
                    return Err(MonitorError::device_unavailable(format!(
                        "unsupported output sample format: {other:?}"
                    )))
                }
            };
            stream
                .play()
                .map_err(|e| MonitorError::device_unavailable(format!("failed to start output: {e}")))?;

            info!(device = %name, "Audio output opened");
            Ok(Self {
                _stream: stream,
                ring,
            })
        }
    }

    impl PcmOutput for CpalOutput {
        fn write(&mut self, samples: &[f32]) -> Result<()> {
            self.ring.write(samples, DEVICE_TIMEOUT)
        }
    }

    fn build_output<T>(device: &Device, config: &StreamConfig, ring: Arc<SampleRing<f32>>) -> Result<Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
    {
        let channels = config.channels as usize;
        let error_ring = ring.clone();
        let mut mono: Vec<f32> = Vec::new();

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels;
                    mono.resize(frames, 0.0);
                    if !ring.try_pop_into(&mut mono) {
                        for sample in data.iter_mut() {
                            *sample = T::EQUILIBRIUM;
                        }
                        return;
                    }
                    // Same mono sample on every channel.
                    for (frame, &value) in data.chunks_mut(channels).zip(mono.iter()) {
                        for sample in frame.iter_mut() {
                            *sample = T::from_sample(value);
                        }
                    }
                },
                move |err| {
                    error!("Audio output stream error: {err}");
                    error_ring.fail();
                },
                None,
            )
            .map_err(|e| MonitorError::device_unavailable(format!("failed to build output stream: {e}")))
    }

    /// Input device handle. Dropping it stops and closes the stream.
    pub(super) struct CpalInput {
        _stream: Stream,
        ring: Arc<SampleRing<i16>>,
    }

    impl CpalInput {
        pub(super) fn open(format: PcmFormat) -> Result<Self> {
            let host = cpal::default_host();
            let device = select_device(&host, false)?;
            let name = device.name().unwrap_or_else(|_| "Unknown".into());
            let supported = select_config(&device, format, false)?;
            let sample_format = supported.sample_format();
            let config: StreamConfig = supported.into();

            debug!(
                device = %name,
                sample_rate = config.sample_rate.0,
                channels = config.channels,
                ?sample_format,
                "Opening audio input"
            );

            let ring = Arc::new(SampleRing::new(INPUT_CAPACITY));
            let stream = match sample_format {
                SampleFormat::F32 => build_input::<f32>(&device, &config, ring.clone())?,
                SampleFormat::I16 => build_input::<i16>(&device, &config, ring.clone())?,
                SampleFormat::I32 => build_input::<i32>(&device, &config, ring.clone())?,
                SampleFormat::U16 => build_input::<u16>(&device, &config, ring.clone())?,
                other => {
                    return Err(MonitorError::device_unavailable(format!(
                        "unsupported input sample format: {other:?}"
                    )))
                }
            };
            stream
                .play()
                .map_err(|e| MonitorError::device_unavailable(format!("failed to start input: {e}")))?;

            info!(device = %name, "Audio input opened");
            Ok(Self {
                _stream: stream,
                ring,
            })
        }
    }

    impl PcmInput for CpalInput {
        fn read(&mut self, frames: usize) -> Result<Vec<i16>> {
            self.ring.read(frames, DEVICE_TIMEOUT)
        }
    }

    fn build_input<T>(device: &Device, config: &StreamConfig, ring: Arc<SampleRing<i16>>) -> Result<Stream>
    where
        T: cpal::SizedSample + Send + 'static,
        f32: cpal::FromSample<T>,
    {
        let channels = config.channels as usize;
        let error_ring = ring.clone();

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    // Mix down to mono and convert to 16-bit.
                    let mono = data.chunks(channels).map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        let value = sum / channels as f32;
                        (value * 32767.0).clamp(-32768.0, 32767.0) as i16
                    });
                    // Runs on the audio thread; a chunk lost to contention is a short gap.
                    ring.try_push_overwrite(mono);
                },
                move |err| {
                    error!("Audio input stream error: {err}");
                    error_ring.fail();
                },
                None,
            )
            .map_err(|e| MonitorError::device_unavailable(format!("failed to build input stream: {e}")))
    }

    pub(super) fn list_devices(output: bool) -> Result<Vec<DeviceInfo>> {
        let host = cpal::default_host();
        let default_name = if output {
            host.default_output_device()
        } else {
            host.default_input_device()
        }
        .and_then(|d| d.name().ok());

        let devices = if output {
            host.output_devices()
                .map_err(|e| MonitorError::device_unavailable(format!("failed to enumerate devices: {e}")))?
                .collect::<Vec<_>>()
        } else {
            host.input_devices()
                .map_err(|e| MonitorError::device_unavailable(format!("failed to enumerate devices: {e}")))?
                .collect::<Vec<_>>()
        };

        Ok(devices
            .into_iter()
            .filter_map(|device| device.name().ok())
            .map(|name| DeviceInfo {
                is_default: default_name.as_ref() == Some(&name),
                id: name.clone(),
                name,
            })
            .collect())
    }
}
