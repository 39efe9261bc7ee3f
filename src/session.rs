//! VoiceprintSession - record, finalize, extract and upload one clip at a time
//!
//! Ties the capture controller to an [`UploadClient`]. Every way a session
//! can end is folded into an [`UploadOutcome`] so callers get a single
//! `(success, status, message)` answer.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{ClipExtractor, SelectedFeatures};
use crate::audio::{CaptureCompletion, CaptureController, PcmDevice};
use crate::config::{AppConfig, ExtractionConfig, UploadConfig};
use crate::error::{log_capture_error, log_extraction_error, CaptureError, ExtractionError};
use crate::upload::{UploadClient, UploadMode, UploadOutcome, UploadRequest};

/// Clears the busy flag when extraction ends, however it ends
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One user's recording-to-verification flow
pub struct VoiceprintSession<C: UploadClient> {
    controller: CaptureController,
    extraction: ExtractionConfig,
    upload: UploadConfig,
    client: C,
    extracting: Arc<AtomicBool>,
}

impl<C: UploadClient> VoiceprintSession<C> {
    /// Create a session from `config`
    ///
    /// # Errors
    /// `InvalidConfig` if the capture settings are unusable
    pub fn new(config: &AppConfig, client: C) -> Result<Self, CaptureError> {
        let controller = CaptureController::new(config.capture.clone())?;
        Ok(Self {
            controller,
            extraction: config.extraction.clone(),
            upload: config.upload.clone(),
            client,
            extracting: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Upload mode from the session configuration
    pub fn default_mode(&self) -> UploadMode {
        self.upload.mode
    }

    pub fn start_recording<D, P>(&self, device: D, path: P) -> Result<CaptureCompletion, CaptureError>
    where
        D: PcmDevice,
        P: AsRef<Path>,
    {
        self.controller.start(device, path)
    }

    pub fn stop_recording(&self) -> Result<(), CaptureError> {
        self.controller.stop()
    }

    /// Extract features from `path` on the blocking pool
    ///
    /// # Errors
    /// `Busy` if another extraction on this session is still running, plus
    /// everything [`ClipExtractor::extract_file`] reports
    pub async fn extract(&self, path: PathBuf) -> Result<SelectedFeatures, ExtractionError> {
        let guard = match BusyGuard::acquire(&self.extracting) {
            Some(guard) => guard,
            None => {
                let err = ExtractionError::Busy;
                log_extraction_error(&err, "session_extract");
                return Err(err);
            }
        };

        // The guard moves into the blocking task: dropping this future does
        // not stop the task, so the flag clears only when the work ends.
        let config = self.extraction.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let mut extractor = ClipExtractor::new(config)?;
            extractor.extract_file(&path)
        })
        .await
        .map_err(|e| ExtractionError::Io {
            details: format!("extraction task failed: {}", e),
        })?
    }

    /// Wait for the recording to finish, then upload it in `mode`
    pub async fn finish_and_upload(
        &self,
        completion: CaptureCompletion,
        mode: UploadMode,
    ) -> UploadOutcome {
        let summary = match completion.wait().await {
            Ok(summary) => summary,
            Err(err) => {
                log_capture_error(&err, "finish_and_upload");
                return UploadOutcome::from_capture_error(&err);
            }
        };

        tracing::info!(
            "[VoiceprintSession] Clip ready: {} ({:.2} s), uploading as {:?}",
            summary.path.display(),
            summary.duration_secs(),
            mode
        );

        let request = match mode {
            UploadMode::ContainerFile => UploadRequest::container_file(&summary.path, &self.upload),
            UploadMode::FeatureVectors => match self.extract(summary.path.clone()).await {
                Ok(selected) => {
                    UploadRequest::feature_vectors(&selected, self.upload.send_all_vectors)
                }
                Err(err) => return UploadOutcome::from_extraction_error(&err),
            },
        };

        self.send(request).await
    }

    /// Hand `request` to the client and fold the answer into an outcome
    pub async fn send(&self, request: UploadRequest) -> UploadOutcome {
        match self.client.upload(request).await {
            Ok(response) => {
                tracing::info!(
                    "[VoiceprintSession] Upload answered: success={}, status={}",
                    response.success,
                    response.status_code
                );
                UploadOutcome::from_response(response)
            }
            Err(err) => {
                tracing::warn!("[VoiceprintSession] Upload failed: {}", err);
                UploadOutcome::from_transport_error(&err)
            }
        }
    }

    /// Stop any recording and wait up to `timeout` for the worker
    pub fn shutdown(&self, timeout: Duration) -> Result<(), CaptureError> {
        self.controller.shutdown(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SyntheticPcmDevice;
    use crate::config::CaptureConfig;
    use crate::error::{TransportError, STATUS_EMPTY_FEATURE_SET, STATUS_LOCAL_FAILURE};
    use crate::upload::RecordingUploadClient;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("voiceprint_session_{}_{}.wav", std::process::id(), name))
    }

    /// 16 kHz capture, 0.1 s ceiling, small MFCC so debug builds stay quick
    fn test_config() -> AppConfig {
        AppConfig {
            capture: CaptureConfig {
                sample_rate: 16_000,
                chunk_bytes: 320,
                max_duration_secs: Some(0.1),
                read_miss_backoff_ms: 1,
                shutdown_timeout_ms: 2_000,
            },
            extraction: ExtractionConfig {
                feature_count: 13,
                filter_bank_size: 26,
                sentinel: -50.0 * 26.0,
                ..ExtractionConfig::default()
            },
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_container_upload_round() {
        let rt = runtime();
        let session =
            VoiceprintSession::new(&test_config(), RecordingUploadClient::accepting("ok")).unwrap();
        let path = temp_wav("container");

        let completion = session
            .start_recording(SyntheticPcmDevice::sine(440.0), &path)
            .unwrap();
        let outcome = rt.block_on(session.finish_and_upload(completion, UploadMode::ContainerFile));

        assert!(outcome.success);
        assert_eq!(outcome.status_code, 200);
        let requests = session.client().requests();
        assert_eq!(requests.len(), 1);
        assert!(matches!(&requests[0], UploadRequest::ContainerFile(upload) if upload.path == path));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_feature_upload_sends_representative() {
        let rt = runtime();
        let session =
            VoiceprintSession::new(&test_config(), RecordingUploadClient::accepting("match"))
                .unwrap();
        let path = temp_wav("features");

        let completion = session
            .start_recording(SyntheticPcmDevice::noise(), &path)
            .unwrap();
        let outcome =
            rt.block_on(session.finish_and_upload(completion, UploadMode::FeatureVectors));

        assert!(outcome.success);
        assert_eq!(outcome.message, "match");
        match &session.client().requests()[0] {
            UploadRequest::FeatureVectors(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].mfcc.split(", ").count(), 13);
            }
            other => panic!("Expected FeatureVectors, got {:?}", other),
        }
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_silent_clip_reports_empty_feature_set() {
        let rt = runtime();
        let session =
            VoiceprintSession::new(&test_config(), RecordingUploadClient::accepting("ok")).unwrap();
        let path = temp_wav("silent");

        let completion = session
            .start_recording(SyntheticPcmDevice::silence(), &path)
            .unwrap();
        let outcome =
            rt.block_on(session.finish_and_upload(completion, UploadMode::FeatureVectors));

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, STATUS_EMPTY_FEATURE_SET);
        assert!(session.client().requests().is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_transport_error_passes_through() {
        let rt = runtime();
        let client = RecordingUploadClient::failing(TransportError::Connection {
            reason: "offline".to_string(),
        });
        let session = VoiceprintSession::new(&test_config(), client).unwrap();
        let path = temp_wav("offline");

        let completion = session
            .start_recording(SyntheticPcmDevice::sine(200.0), &path)
            .unwrap();
        let outcome = rt.block_on(session.finish_and_upload(completion, UploadMode::ContainerFile));

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, STATUS_LOCAL_FAILURE);
        assert!(outcome.message.contains("offline"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_capture_failure_is_local_failure() {
        let rt = runtime();
        let session =
            VoiceprintSession::new(&test_config(), RecordingUploadClient::accepting("ok")).unwrap();
        let path = temp_wav("capture_failure");

        let completion = session
            .start_recording(SyntheticPcmDevice::sine(200.0).failing_after(1), &path)
            .unwrap();
        let outcome = rt.block_on(session.finish_and_upload(completion, UploadMode::ContainerFile));

        assert!(!outcome.success);
        assert_eq!(outcome.status_code, STATUS_LOCAL_FAILURE);
        assert!(session.client().requests().is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_concurrent_extraction_is_busy() {
        let rt = runtime();
        let config = AppConfig {
            extraction: ExtractionConfig::default(),
            ..test_config()
        };
        let session = VoiceprintSession::new(&config, RecordingUploadClient::accepting("ok")).unwrap();
        let path = temp_wav("busy");

        // Long enough that the first extraction is still running
        let long_config = CaptureConfig {
            max_duration_secs: Some(0.5),
            ..config.capture.clone()
        };
        let recorder = CaptureController::new(long_config).unwrap();
        recorder
            .start(SyntheticPcmDevice::noise(), &path)
            .unwrap()
            .wait_blocking()
            .unwrap();

        let (first, second) = rt.block_on(async {
            tokio::join!(session.extract(path.clone()), session.extract(path.clone()))
        });
        assert!(first.is_ok());
        assert_eq!(second, Err(ExtractionError::Busy));

        // Flag is released afterwards
        assert!(rt.block_on(session.extract(path.clone())).is_ok());
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_cancelled_extraction_keeps_session_busy() {
        let rt = runtime();
        let config = AppConfig {
            extraction: ExtractionConfig::default(),
            ..test_config()
        };
        let session = VoiceprintSession::new(&config, RecordingUploadClient::accepting("ok")).unwrap();
        let path = temp_wav("cancelled");

        let long_config = CaptureConfig {
            max_duration_secs: Some(1.0),
            ..config.capture.clone()
        };
        CaptureController::new(long_config)
            .unwrap()
            .start(SyntheticPcmDevice::noise(), &path)
            .unwrap()
            .wait_blocking()
            .unwrap();

        let (first, second) = rt.block_on(async {
            let first =
                tokio::time::timeout(Duration::from_millis(1), session.extract(path.clone())).await;
            (first, session.extract(path.clone()).await)
        });
        assert!(first.is_err(), "first extraction should have been cancelled");
        assert_eq!(second, Err(ExtractionError::Busy));

        // The abandoned task still finishes and releases the session
        let deadline = std::time::Instant::now() + Duration::from_secs(30);
        loop {
            match rt.block_on(session.extract(path.clone())) {
                Ok(_) => break,
                Err(ExtractionError::Busy) if std::time::Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                other => panic!("Expected the session to free up, got {:?}", other),
            }
        }
        let _ = std::fs::remove_file(path);
    }
}
