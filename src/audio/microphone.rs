//! cpal microphone input for the capture worker.
//!
//! The cpal callback runs on the audio thread and only pushes samples into
//! an rtrb ring; the capture worker drains the ring through [`PcmSource`]
//! reads. Samples are converted to `i16` and reduced to the first channel
//! in the callback, so the worker always sees mono 16-bit PCM.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer, RingBuffer};

use super::source::{PcmDevice, PcmSource};
use crate::audio::AudioStreamConfig;
use crate::error::CaptureError;

/// Seconds of audio the callback can run ahead of the capture worker
const RING_SECONDS: usize = 2;

/// Longest a read waits for the callback before reporting a miss
const READ_WAIT: Duration = Duration::from_millis(20);

/// Default system microphone (or a named input) opened through cpal
///
/// The cpal callback pushes mono `i16` samples into an rtrb SPSC ring; the
/// capture worker drains it on `read`. Multi-channel devices are reduced to
/// their first channel.
#[derive(Debug, Default, Clone)]
pub struct CpalPcmDevice {
    device_name: Option<String>,
}

impl CpalPcmDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the input whose name matches `name` instead of the default
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }

    /// Names of the available input devices
    pub fn list_devices() -> Result<Vec<String>, CaptureError> {
        let host = cpal::default_host();
        let devices = host.input_devices().map_err(|e| CaptureError::DeviceInit {
            reason: format!("Failed to enumerate input devices: {}", e),
        })?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    fn find_device(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host
                .default_input_device()
                .ok_or_else(|| CaptureError::DeviceInit {
                    reason: "No default input device found".to_string(),
                }),
            Some(wanted) => host
                .input_devices()
                .map_err(|e| CaptureError::DeviceInit {
                    reason: format!("Failed to enumerate input devices: {}", e),
                })?
                .find(|device| device.name().map(|n| &n == wanted).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceInit {
                    reason: format!("Input device '{}' not found", wanted),
                }),
        }
    }
}

impl PcmDevice for CpalPcmDevice {
    fn name(&self) -> String {
        self.device_name
            .clone()
            .unwrap_or_else(|| "default input".to_string())
    }

    fn acquire(&mut self, config: &AudioStreamConfig) -> Result<Box<dyn PcmSource>, CaptureError> {
        let device = self.find_device()?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let target_rate = cpal::SampleRate(config.sample_rate);
        let supported = device
            .supported_input_configs()
            .map_err(|e| CaptureError::DeviceInit {
                reason: format!("Failed to query input configs: {:?}", e),
            })?
            .filter(|range| {
                range.min_sample_rate() <= target_rate && target_rate <= range.max_sample_rate()
            })
            .filter(|range| {
                matches!(
                    range.sample_format(),
                    cpal::SampleFormat::F32 | cpal::SampleFormat::I16
                )
            })
            .min_by_key(|range| range.channels())
            .ok_or_else(|| CaptureError::DeviceInit {
                reason: format!(
                    "{} does not support {} Hz with F32/I16 samples",
                    device_name, config.sample_rate
                ),
            })?
            .with_sample_rate(target_rate);

        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let channels_count = stream_config.channels as usize;

        let (producer, consumer) = RingBuffer::new(config.sample_rate as usize * RING_SECONDS);
        let dropped = Arc::new(AtomicU64::new(0));

        let err_fn = |err: cpal::StreamError| tracing::error!("[Microphone] Input stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => {
                let mut sink = CallbackSink::new(producer, channels_count, Arc::clone(&dropped));
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        sink.push_frames(data, |s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let mut sink = CallbackSink::new(producer, channels_count, Arc::clone(&dropped));
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| sink.push_frames(data, |s| s),
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(CaptureError::DeviceInit {
                    reason: format!("Unsupported input sample format {:?}", other),
                })
            }
        }
        .map_err(|e| CaptureError::DeviceInit {
            reason: format!("{:?}", e),
        })?;

        stream.play().map_err(|e| CaptureError::DeviceInit {
            reason: format!("Input start failed: {}", e),
        })?;

        tracing::info!(
            "[Microphone] Using {} ({} ch @ {} Hz, {:?})",
            device_name,
            channels_count,
            config.sample_rate,
            sample_format
        );

        Ok(Box::new(MicrophoneSource {
            stream: Some(stream),
            consumer,
            dropped,
        }))
    }
}

/// State moved into the cpal callback
struct CallbackSink {
    producer: Producer<i16>,
    channels: usize,
    dropped: Arc<AtomicU64>,
}

impl CallbackSink {
    fn new(producer: Producer<i16>, channels: usize, dropped: Arc<AtomicU64>) -> Self {
        Self {
            producer,
            channels: channels.max(1),
            dropped,
        }
    }

    fn push_frames<T: Copy>(&mut self, data: &[T], convert: impl Fn(T) -> i16) {
        for frame in data.chunks(self.channels) {
            // De-interleave: take first channel
            if self.producer.push(convert(frame[0])).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

struct MicrophoneSource {
    stream: Option<cpal::Stream>,
    consumer: Consumer<i16>,
    dropped: Arc<AtomicU64>,
}

impl PcmSource for MicrophoneSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        let deadline = Instant::now() + READ_WAIT;
        while self.consumer.slots() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let available = self.consumer.slots().min(buf.len() / 2);
        if available == 0 {
            return Ok(0);
        }

        let chunk = self
            .consumer
            .read_chunk(available)
            .map_err(|e| CaptureError::StreamFailure {
                reason: format!("ring buffer read failed: {}", e),
            })?;
        let (first, second) = chunk.as_slices();
        for (i, sample) in first.iter().chain(second.iter()).enumerate() {
            buf[i * 2..i * 2 + 2].copy_from_slice(&sample.to_le_bytes());
        }
        chunk.commit_all();

        Ok(available * 2)
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::warn!("[Microphone] Failed to pause input stream: {}", e);
            }
            drop(stream);
        }
        let dropped = self.dropped.load(Ordering::Relaxed);
        if dropped > 0 {
            tracing::warn!(
                "[Microphone] Capture worker fell behind; {} samples dropped",
                dropped
            );
        }
    }
}
