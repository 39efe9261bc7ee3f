//! Synthetic input devices for deterministic capture runs.
//!
//! Used by the test suites and the CLI `--synthetic` flag to exercise the
//! full capture loop without a microphone.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::format::encode_pcm16;
use super::source::{PcmDevice, PcmSource};
use crate::audio::AudioStreamConfig;
use crate::error::CaptureError;

/// Waveform produced by a [`SyntheticPcmDevice`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyntheticSignal {
    Silence,
    Sine { frequency_hz: f32, amplitude: f32 },
    Noise { amplitude: f32 },
    /// Fixed chunks emitted in order, followed by read misses
    Scripted(Vec<Vec<u8>>),
}

/// Counters shared between a synthetic device and the test observing it
#[derive(Debug, Default)]
pub struct SyntheticProbe {
    reads: AtomicUsize,
    misses: AtomicUsize,
    released: AtomicBool,
}

impl SyntheticProbe {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Configurable fake microphone
pub struct SyntheticPcmDevice {
    signal: SyntheticSignal,
    acquire_failure: Option<String>,
    read_delay: Option<Duration>,
    pace_realtime: bool,
    miss_every: Option<usize>,
    fail_after_reads: Option<usize>,
    probe: Arc<SyntheticProbe>,
}

impl SyntheticPcmDevice {
    pub fn new(signal: SyntheticSignal) -> Self {
        Self {
            signal,
            acquire_failure: None,
            read_delay: None,
            pace_realtime: false,
            miss_every: None,
            fail_after_reads: None,
            probe: Arc::new(SyntheticProbe::default()),
        }
    }

    pub fn silence() -> Self {
        Self::new(SyntheticSignal::Silence)
    }

    pub fn sine(frequency_hz: f32) -> Self {
        Self::new(SyntheticSignal::Sine {
            frequency_hz,
            amplitude: 0.5,
        })
    }

    pub fn noise() -> Self {
        Self::new(SyntheticSignal::Noise { amplitude: 0.3 })
    }

    pub fn scripted(chunks: Vec<Vec<u8>>) -> Self {
        Self::new(SyntheticSignal::Scripted(chunks))
    }

    /// Make `acquire` fail as if the device were unavailable
    pub fn failing_acquire(mut self, reason: &str) -> Self {
        self.acquire_failure = Some(reason.to_string());
        self
    }

    /// Block every read for `delay`
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Sleep for the duration of audio returned by each read
    pub fn paced(mut self) -> Self {
        self.pace_realtime = true;
        self
    }

    /// Return a zero-byte read on every `n`th call
    pub fn with_miss_every(mut self, n: usize) -> Self {
        self.miss_every = Some(n.max(1));
        self
    }

    /// Fail with a stream error once `n` reads have succeeded
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after_reads = Some(n);
        self
    }

    pub fn probe(&self) -> Arc<SyntheticProbe> {
        Arc::clone(&self.probe)
    }
}

impl PcmDevice for SyntheticPcmDevice {
    fn name(&self) -> String {
        let kind = match &self.signal {
            SyntheticSignal::Silence => "silence",
            SyntheticSignal::Sine { .. } => "sine",
            SyntheticSignal::Noise { .. } => "noise",
            SyntheticSignal::Scripted(_) => "scripted",
        };
        format!("synthetic:{}", kind)
    }

    fn acquire(&mut self, config: &AudioStreamConfig) -> Result<Box<dyn PcmSource>, CaptureError> {
        if let Some(reason) = &self.acquire_failure {
            return Err(CaptureError::DeviceInit {
                reason: reason.clone(),
            });
        }

        let scripted = match &self.signal {
            SyntheticSignal::Scripted(chunks) => chunks.iter().cloned().collect(),
            _ => VecDeque::new(),
        };

        Ok(Box::new(SyntheticSource {
            signal: self.signal.clone(),
            scripted,
            sample_rate: config.sample_rate,
            phase: 0.0,
            read_delay: self.read_delay,
            pace_realtime: self.pace_realtime,
            miss_every: self.miss_every,
            fail_after_reads: self.fail_after_reads,
            calls: 0,
            probe: Arc::clone(&self.probe),
        }))
    }
}

struct SyntheticSource {
    signal: SyntheticSignal,
    scripted: VecDeque<Vec<u8>>,
    sample_rate: u32,
    phase: f32,
    read_delay: Option<Duration>,
    pace_realtime: bool,
    miss_every: Option<usize>,
    fail_after_reads: Option<usize>,
    calls: usize,
    probe: Arc<SyntheticProbe>,
}

impl SyntheticSource {
    fn generate(&mut self, sample_count: usize) -> Vec<f32> {
        match self.signal {
            SyntheticSignal::Silence | SyntheticSignal::Scripted(_) => vec![0.0; sample_count],
            SyntheticSignal::Sine {
                frequency_hz,
                amplitude,
            } => {
                let step = 2.0 * PI * frequency_hz / self.sample_rate as f32;
                (0..sample_count)
                    .map(|_| {
                        let value = amplitude * self.phase.sin();
                        self.phase = (self.phase + step) % (2.0 * PI);
                        value
                    })
                    .collect()
            }
            SyntheticSignal::Noise { amplitude } if amplitude > 0.0 => {
                let mut rng = rand::thread_rng();
                (0..sample_count)
                    .map(|_| rng.gen_range(-amplitude..amplitude))
                    .collect()
            }
            SyntheticSignal::Noise { .. } => vec![0.0; sample_count],
        }
    }
}

impl PcmSource for SyntheticSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        self.calls += 1;
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }

        if let Some(limit) = self.fail_after_reads {
            if self.probe.reads() >= limit {
                return Err(CaptureError::StreamFailure {
                    reason: "synthetic device disconnected".to_string(),
                });
            }
        }

        if self.miss_every.is_some_and(|n| self.calls % n == 0) {
            self.probe.misses.fetch_add(1, Ordering::SeqCst);
            return Ok(0);
        }

        let written = if matches!(self.signal, SyntheticSignal::Scripted(_)) {
            match self.scripted.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    n
                }
                None => 0,
            }
        } else {
            let samples = self.generate(buf.len() / 2);
            let bytes = encode_pcm16(&samples);
            buf[..bytes.len()].copy_from_slice(&bytes);
            bytes.len()
        };

        if written == 0 {
            self.probe.misses.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1));
            return Ok(0);
        }

        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        if self.pace_realtime {
            let secs = (written / 2) as f64 / self.sample_rate as f64;
            std::thread::sleep(Duration::from_secs_f64(secs));
        }
        Ok(written)
    }

    fn release(&mut self) {
        self.probe.released.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AudioStreamConfig {
        AudioStreamConfig::mono_16bit(16_000).unwrap()
    }

    #[test]
    fn test_failing_acquire_reports_device_init() {
        let mut device = SyntheticPcmDevice::silence().failing_acquire("busy");
        match device.acquire(&config()) {
            Err(CaptureError::DeviceInit { reason }) => assert_eq!(reason, "busy"),
            _ => panic!("Expected DeviceInit"),
        }
    }

    #[test]
    fn test_scripted_chunks_then_misses() {
        let mut device = SyntheticPcmDevice::scripted(vec![vec![1, 2], vec![3, 4, 5, 6]]);
        let probe = device.probe();
        let mut source = device.acquire(&config()).unwrap();
        let mut buf = [0u8; 16];

        assert_eq!(source.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        assert_eq!(source.read(&mut buf).unwrap(), 4);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        assert_eq!(probe.reads(), 2);
        assert_eq!(probe.misses(), 1);

        source.release();
        assert!(probe.released());
    }

    #[test]
    fn test_sine_fills_whole_samples() {
        let mut device = SyntheticPcmDevice::sine(440.0);
        let mut source = device.acquire(&config()).unwrap();
        let mut buf = [0u8; 65];
        assert_eq!(source.read(&mut buf).unwrap(), 64);
    }

    #[test]
    fn test_miss_every_and_failure() {
        let mut device = SyntheticPcmDevice::noise()
            .with_miss_every(2)
            .failing_after(1);
        let mut source = device.acquire(&config()).unwrap();
        let mut buf = [0u8; 8];

        assert_eq!(source.read(&mut buf).unwrap(), 8);
        assert!(matches!(
            source.read(&mut buf),
            Err(CaptureError::StreamFailure { .. })
        ));
    }
}
