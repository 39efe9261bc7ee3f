//! CaptureController - recording lifecycle and the capture worker
//!
//! Architecture:
//! - Controlling thread: `start` / `stop` / `shutdown`, any thread may hold a
//!   [`StopSignal`]
//! - Capture worker: acquires the device, owns the container writer, runs a
//!   blocking read/append loop until the stop flag clears or the byte
//!   ceiling is reached, then finalizes the header and releases the device
//!
//! Thread safety:
//! - recording flag: `Arc<AtomicBool>`, written by `stop`, read by the loop
//! - byte counter: `Arc<AtomicU64>` mirrored from the worker
//! - completion: tokio oneshot carrying the session result
//!
//! Stop is cooperative. A read that is already blocked finishes before the
//! loop sees the cleared flag, so a small tail of audio may follow a stop
//! request. `shutdown` bounds how long the caller waits for that tail.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use super::source::{PcmDevice, PcmSource};
use super::wav_writer::StreamingContainerWriter;
use crate::audio::AudioStreamConfig;
use crate::config::CaptureConfig;
use crate::error::{log_capture_error, CaptureError};

/// Recording lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureState {
    Idle,
    Recording,
    Stopped,
}

/// Why the capture loop exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// `stop` cleared the recording flag
    Cancelled,
    /// The configured duration ceiling was reached
    MaxDurationReached,
    /// The source returned an error; the file was still finalized
    SourceFailed,
}

/// Result of a finished recording session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub path: PathBuf,
    pub config: AudioStreamConfig,
    pub data_bytes: u64,
    pub stop_reason: StopReason,
}

impl CaptureSummary {
    pub fn duration_secs(&self) -> f64 {
        self.data_bytes as f64 / self.config.byte_rate() as f64
    }
}

/// Cloneable handle that requests the active recording to stop
#[derive(Debug, Clone)]
pub struct StopSignal {
    recording: Arc<AtomicBool>,
}

impl StopSignal {
    /// Clear the recording flag; returns immediately
    pub fn stop(&self) {
        self.recording.store(false, Ordering::SeqCst);
    }
}

/// One-shot completion of a recording session
///
/// Resolves once the worker has finalized the file and released the device.
pub struct CaptureCompletion {
    rx: oneshot::Receiver<Result<CaptureSummary, CaptureError>>,
}

impl CaptureCompletion {
    /// Await the session result from async code
    pub async fn wait(self) -> Result<CaptureSummary, CaptureError> {
        self.rx.await.unwrap_or_else(|_| Err(worker_vanished()))
    }

    /// Block the current (non-async) thread until the session finishes
    pub fn wait_blocking(self) -> Result<CaptureSummary, CaptureError> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(worker_vanished()))
    }
}

fn worker_vanished() -> CaptureError {
    CaptureError::StreamFailure {
        reason: "capture worker exited without reporting a result".to_string(),
    }
}

/// Owns the recording lifecycle: Idle -> Recording -> Stopped
///
/// # Example
/// ```ignore
/// let controller = CaptureController::new(CaptureConfig::default())?;
/// let completion = controller.start(CpalPcmDevice::new(), "clip.wav")?;
/// // ... later, from any thread
/// controller.stop()?;
/// let summary = completion.wait_blocking()?;
/// ```
pub struct CaptureController {
    config: CaptureConfig,
    stream: AudioStreamConfig,
    max_bytes: Option<u64>,
    recording: Arc<AtomicBool>,
    state: Arc<Mutex<CaptureState>>,
    bytes_captured: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureController {
    /// Validate `config` and create an idle controller
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        config.validate()?;
        let stream = config.stream_config()?;
        let max_bytes = config.max_duration_bytes()?;

        Ok(Self {
            config,
            stream,
            max_bytes,
            recording: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            bytes_captured: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn stream_config(&self) -> AudioStreamConfig {
        self.stream
    }

    pub fn state(&self) -> CaptureState {
        self.lock_state().map(|guard| *guard).unwrap_or(CaptureState::Stopped)
    }

    pub fn is_recording(&self) -> bool {
        self.state() == CaptureState::Recording
    }

    /// PCM bytes written by the current (or last) session
    pub fn bytes_captured(&self) -> u64 {
        self.bytes_captured.load(Ordering::SeqCst)
    }

    pub fn stop_signal(&self) -> StopSignal {
        StopSignal {
            recording: Arc::clone(&self.recording),
        }
    }

    /// Start recording `device` into a new WAV file at `path`
    ///
    /// Blocks only until the worker has acquired the device and written the
    /// placeholder header.
    ///
    /// # Errors
    /// - `AlreadyRecording` if a session is active
    /// - `DeviceInit` if the device cannot be acquired (not retried)
    /// - `Io` if the output file cannot be created
    pub fn start<D, P>(&self, device: D, path: P) -> Result<CaptureCompletion, CaptureError>
    where
        D: PcmDevice,
        P: AsRef<Path>,
    {
        let path = path.as_ref().to_path_buf();

        // Reserve the session, then release the lock so `stop` and `state`
        // stay responsive while the worker acquires the device.
        let previous = {
            let mut state = self.lock_state()?;
            if *state == CaptureState::Recording {
                let err = CaptureError::AlreadyRecording;
                log_capture_error(&err, "start");
                return Err(err);
            }
            std::mem::replace(&mut *state, CaptureState::Recording)
        };

        self.reap_finished_worker();

        self.bytes_captured.store(0, Ordering::SeqCst);
        self.recording.store(true, Ordering::SeqCst);

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (done_tx, done_rx) = oneshot::channel();

        let worker = CaptureWorker {
            device: Box::new(device),
            path,
            stream: self.stream,
            chunk_bytes: self.config.chunk_bytes,
            max_bytes: self.max_bytes,
            read_miss_backoff: Duration::from_millis(self.config.read_miss_backoff_ms),
            recording: Arc::clone(&self.recording),
            state: Arc::clone(&self.state),
            bytes_captured: Arc::clone(&self.bytes_captured),
        };

        let spawned = std::thread::Builder::new()
            .name("pcm-capture".to_string())
            .spawn(move || worker.run(ready_tx, done_tx));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let err = CaptureError::StreamFailure {
                    reason: format!("failed to spawn capture worker: {}", e),
                };
                self.abandon_start(previous);
                log_capture_error(&err, "start");
                return Err(err);
            }
        };

        let ready = ready_rx.recv().unwrap_or_else(|_| Err(worker_vanished()));
        if let Err(err) = ready {
            let _ = handle.join();
            self.abandon_start(previous);
            log_capture_error(&err, "start");
            return Err(err);
        }

        *self.lock_worker()? = Some(handle);

        Ok(CaptureCompletion { rx: done_rx })
    }

    /// Request the active recording to stop
    ///
    /// Never blocks: the worker drains, finalizes and reports through the
    /// completion on its own schedule.
    ///
    /// # Errors
    /// `NotRecording` if no session is active (the flag is cleared anyway)
    pub fn stop(&self) -> Result<(), CaptureError> {
        self.recording.store(false, Ordering::SeqCst);
        if self.state() != CaptureState::Recording {
            return Err(CaptureError::NotRecording);
        }
        tracing::debug!("[CaptureController] Stop requested");
        Ok(())
    }

    /// Stop and wait up to `timeout` for the worker to exit
    ///
    /// On timeout the worker handle is kept so a later call can retry.
    pub fn shutdown(&self, timeout: Duration) -> Result<(), CaptureError> {
        self.recording.store(false, Ordering::SeqCst);

        let handle = match self.lock_worker()?.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        let started = Instant::now();
        while !handle.is_finished() {
            if started.elapsed() >= timeout {
                let err = CaptureError::ShutdownTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                };
                log_capture_error(&err, "shutdown");
                *self.lock_worker()? = Some(handle);
                return Err(err);
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        handle.join().map_err(|_| CaptureError::StreamFailure {
            reason: "capture worker panicked".to_string(),
        })
    }

    /// Shutdown using the configured timeout
    pub fn shutdown_default(&self) -> Result<(), CaptureError> {
        self.shutdown(Duration::from_millis(self.config.shutdown_timeout_ms))
    }

    /// Undo the reservation made by a `start` that never got going
    fn abandon_start(&self, previous: CaptureState) {
        self.recording.store(false, Ordering::SeqCst);
        if let Ok(mut state) = self.lock_state() {
            *state = previous;
        }
    }

    fn reap_finished_worker(&self) {
        if let Ok(mut guard) = self.worker.lock() {
            if guard.as_ref().is_some_and(|h| h.is_finished()) {
                if let Some(handle) = guard.take() {
                    let _ = handle.join();
                }
            }
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, CaptureState>, CaptureError> {
        self.state.lock().map_err(|_| {
            let err = CaptureError::LockPoisoned {
                component: "capture_state".to_string(),
            };
            log_capture_error(&err, "lock_state");
            err
        })
    }

    fn lock_worker(&self) -> Result<MutexGuard<'_, Option<JoinHandle<()>>>, CaptureError> {
        self.worker.lock().map_err(|_| {
            let err = CaptureError::LockPoisoned {
                component: "capture_worker".to_string(),
            };
            log_capture_error(&err, "lock_worker");
            err
        })
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.recording.store(false, Ordering::SeqCst);
    }
}

/// Marks the session stopped when the worker exits, including by panic
struct StopOnExit {
    recording: Arc<AtomicBool>,
    state: Arc<Mutex<CaptureState>>,
}

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.recording.store(false, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = CaptureState::Stopped;
    }
}

/// Everything the worker thread owns for one session
struct CaptureWorker {
    device: Box<dyn PcmDevice>,
    path: PathBuf,
    stream: AudioStreamConfig,
    chunk_bytes: usize,
    max_bytes: Option<u64>,
    read_miss_backoff: Duration,
    recording: Arc<AtomicBool>,
    state: Arc<Mutex<CaptureState>>,
    bytes_captured: Arc<AtomicU64>,
}

impl CaptureWorker {
    fn run(
        mut self,
        ready_tx: mpsc::SyncSender<Result<(), CaptureError>>,
        done_tx: oneshot::Sender<Result<CaptureSummary, CaptureError>>,
    ) {
        let (mut source, writer) = match self.open() {
            Ok(opened) => opened,
            Err(err) => {
                let _ = ready_tx.send(Err(err));
                return;
            }
        };
        let stop_on_exit = StopOnExit {
            recording: Arc::clone(&self.recording),
            state: Arc::clone(&self.state),
        };
        let _ = ready_tx.send(Ok(()));

        tracing::info!(
            "[CaptureWorker] Recording {} to {} ({} Hz, ceiling {:?} bytes)",
            self.device.name(),
            self.path.display(),
            self.stream.sample_rate,
            self.max_bytes
        );

        let result = self.record(source.as_mut(), writer);
        source.release();

        // Stopped must be visible before the completion resolves
        drop(stop_on_exit);

        match &result {
            Ok(summary) => tracing::info!(
                "[CaptureWorker] Recording finished: {} bytes ({:.2} s), reason {:?}",
                summary.data_bytes,
                summary.duration_secs(),
                summary.stop_reason
            ),
            Err(err) => log_capture_error(err, "capture_worker"),
        }

        let _ = done_tx.send(result);
    }

    fn open(
        &mut self,
    ) -> Result<(Box<dyn PcmSource>, StreamingContainerWriter), CaptureError> {
        let mut source = self.device.acquire(&self.stream)?;

        let writer = StreamingContainerWriter::open(&self.path, self.stream).and_then(|mut w| {
            w.write_header_placeholder()?;
            Ok(w)
        });

        match writer {
            Ok(writer) => Ok((source, writer)),
            Err(err) => {
                source.release();
                Err(err)
            }
        }
    }

    fn record(
        &self,
        source: &mut dyn PcmSource,
        mut writer: StreamingContainerWriter,
    ) -> Result<CaptureSummary, CaptureError> {
        let mut buffer = vec![0u8; self.chunk_bytes];
        let mut total: u64 = 0;
        let mut stream_error = None;

        let stop_reason = loop {
            if !self.recording.load(Ordering::SeqCst) {
                break StopReason::Cancelled;
            }
            if self.max_bytes.is_some_and(|max| total >= max) {
                break StopReason::MaxDurationReached;
            }

            let read = match source.read(&mut buffer) {
                Ok(read) => read,
                Err(err) => {
                    tracing::warn!("[CaptureWorker] Source read failed: {}", err);
                    stream_error = Some(err);
                    break StopReason::SourceFailed;
                }
            };

            if read == 0 {
                // Transient miss: back off and retry
                std::thread::sleep(self.read_miss_backoff);
                continue;
            }

            let accepted = match self.max_bytes {
                Some(max) => read.min((max - total) as usize),
                None => read,
            };

            if let Err(err) = writer.append_pcm(&buffer[..accepted]) {
                // The header is left as the placeholder; the file stays invalid.
                self.bytes_captured.store(total, Ordering::SeqCst);
                return Err(err);
            }
            total += accepted as u64;
            self.bytes_captured.store(total, Ordering::SeqCst);
        };

        writer.finalize(total)?;

        if let Some(err) = stream_error {
            return Err(err);
        }

        Ok(CaptureSummary {
            path: self.path.clone(),
            config: self.stream,
            data_bytes: total,
            stop_reason,
        })
    }
}
