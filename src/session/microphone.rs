//! Live microphone streaming.
//!
//! Every listener gets its own capture thread and input device handle. If the
//! device cannot be opened, or fails mid-stream, the listener keeps receiving
//! silence at the real-time rate instead of an error.

use crate::devices::data::{PcmFormat, MIC_CHUNK_BYTES, MIC_CHUNK_FRAMES, SAMPLE_RATE};
use crate::devices::traits::AudioBackend;
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Content type of the audio feed response.
pub const AUDIO_CONTENT_TYPE: &str = "audio/x-raw";

/// Chunks buffered between the capture thread and the HTTP response.
const CHANNEL_CAPACITY: usize = 4;

/// Wall-clock duration of one chunk.
pub fn chunk_interval() -> Duration {
    Duration::from_secs_f64(MIC_CHUNK_FRAMES as f64 / SAMPLE_RATE as f64)
}

/// A chunk of silence, the same size as a live chunk.
pub fn silence_chunk() -> Bytes {
    static SILENCE: [u8; MIC_CHUNK_BYTES] = [0; MIC_CHUNK_BYTES];
    Bytes::from_static(&SILENCE)
}

/// Pack samples as little-endian 16-bit PCM.
pub fn pcm_bytes(samples: &[i16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(samples.len() * 2);
    for &sample in samples {
        buf.put_i16_le(sample);
    }
    buf.freeze()
}

enum Feed {
    Live(mpsc::Receiver<Bytes>),
    Silence(Interval),
}

struct Listener {
    id: Uuid,
    feed: Feed,
}

impl Drop for Listener {
    fn drop(&mut self) {
        info!(listener = %self.id, "Audio listener disconnected");
    }
}

fn silence_feed() -> Feed {
    let mut ticker = interval(chunk_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Feed::Silence(ticker)
}

/// Infinite stream of raw PCM chunks (s16le, mono, 44.1 kHz).
///
/// Dropping the stream closes the channel; the capture thread notices on its
/// next chunk and releases the input device.
pub fn microphone_stream(backend: Arc<dyn AudioBackend>) -> BoxStream<'static, Bytes> {
    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    let spawned = thread::Builder::new()
        .name("microphone".to_string())
        .spawn(move || capture(backend, tx, id));

    let feed = match spawned {
        Ok(_) => Feed::Live(rx),
        Err(e) => {
            warn!(listener = %id, "Failed to spawn microphone thread: {}", e);
            silence_feed()
        }
    };
    info!(listener = %id, "Audio listener connected");

    stream::unfold(Listener { id, feed }, |mut listener| async move {
        if let Feed::Live(rx) = &mut listener.feed {
            match rx.recv().await {
                Some(chunk) => return Some((chunk, listener)),
                None => {
                    info!(listener = %listener.id, "Microphone unavailable, streaming silence");
                    listener.feed = silence_feed();
                }
            }
        }
        if let Feed::Silence(ticker) = &mut listener.feed {
            ticker.tick().await;
        }
        Some((silence_chunk(), listener))
    })
    .boxed()
}

fn capture(backend: Arc<dyn AudioBackend>, tx: mpsc::Sender<Bytes>, id: Uuid) {
    let mut input = match backend.open_input(PcmFormat::MONO_44K) {
        Ok(input) => input,
        Err(e) => {
            warn!(listener = %id, "Could not open microphone: {}", e);
            return;
        }
    };
    debug!(listener = %id, "Microphone opened");

    loop {
        let samples = match input.read(MIC_CHUNK_FRAMES) {
            Ok(samples) => samples,
            Err(e) => {
                warn!(listener = %id, "Microphone read failed: {}", e);
                break;
            }
        };
        if tx.blocking_send(pcm_bytes(&samples)).is_err() {
            break;
        }
    }

    drop(input);
    debug!(listener = %id, "Microphone closed");
}
