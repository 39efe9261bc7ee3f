//! Configuration management for capture, extraction and upload
//!
//! This module provides runtime configuration loading from JSON files so the
//! frame geometry, mel filter bank and capture ceiling can be tuned without
//! recompilation. Missing or malformed files fall back to defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::mfcc::WindowFunction;
use crate::audio::AudioStreamConfig;
use crate::error::{CaptureError, ExtractionError};
use crate::upload::UploadMode;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Recording parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Sample rate requested from the input device in Hz
    pub sample_rate: u32,
    /// Bytes pulled from the source per loop iteration
    pub chunk_bytes: usize,
    /// Hard ceiling on recording length; `None` records until stopped
    pub max_duration_secs: Option<f32>,
    /// Pause after a zero-byte read before retrying
    pub read_miss_backoff_ms: u64,
    /// Upper bound on waiting for the worker during shutdown
    pub shutdown_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            chunk_bytes: 4096,
            max_duration_secs: Some(2.0),
            read_miss_backoff_ms: 2,
            shutdown_timeout_ms: 2_000,
        }
    }
}

impl CaptureConfig {
    /// Stream format recorded by the capture worker (mono, 16-bit)
    pub fn stream_config(&self) -> Result<AudioStreamConfig, CaptureError> {
        AudioStreamConfig::mono_16bit(self.sample_rate)
    }

    /// Ceiling in PCM bytes, rounded down to a whole sample frame
    pub fn max_duration_bytes(&self) -> Result<Option<u64>, CaptureError> {
        let stream = self.stream_config()?;
        match self.max_duration_secs {
            None => Ok(None),
            Some(secs) if !secs.is_finite() || secs <= 0.0 => Err(CaptureError::InvalidConfig {
                reason: format!("max_duration_secs must be positive (got {})", secs),
            }),
            Some(secs) => {
                let samples = (secs as f64 * stream.sample_rate as f64).floor() as u64;
                Ok(Some(samples * stream.block_align() as u64))
            }
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.chunk_bytes == 0 {
            return Err(CaptureError::InvalidConfig {
                reason: "chunk_bytes must be greater than 0".to_string(),
            });
        }
        self.max_duration_bytes().map(|_| ())
    }
}

/// MFCC extraction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Sample rate assumed for raw PCM buffers (container files carry their own)
    pub sample_rate: u32,
    /// Analysis frame length in seconds
    pub frame_duration_secs: f64,
    /// Stride between frame starts in seconds
    pub hop_duration_secs: f64,
    /// Cepstral coefficients kept per frame
    pub feature_count: usize,
    /// Number of triangular mel bands
    pub filter_bank_size: usize,
    /// Lower edge of the filter bank in Hz (upper edge is Nyquist)
    pub lower_frequency_hz: f32,
    /// Pre-emphasis coefficient
    pub pre_emphasis: f32,
    /// Whether pre-emphasis runs before framing
    pub apply_pre_emphasis: bool,
    pub window: WindowFunction,
    /// First-coefficient value marking a silent/invalid frame
    ///
    /// A silent frame floors every band at -50, so its first coefficient is
    /// -50 x filter_bank_size; the default matches 500 bands.
    pub sentinel: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            frame_duration_secs: 0.001,
            hop_duration_secs: 0.0005,
            feature_count: 300,
            filter_bank_size: 500,
            lower_frequency_hz: 0.0,
            pre_emphasis: 0.87,
            apply_pre_emphasis: false,
            window: WindowFunction::Hamming,
            sentinel: -25_000.0,
        }
    }
}

impl ExtractionConfig {
    /// Reject parameters that cannot produce a feature vector
    pub fn validate(&self) -> Result<(), ExtractionError> {
        let fail = |reason: String| Err(ExtractionError::Configuration { reason });

        if self.sample_rate == 0 {
            return fail("sample_rate must be greater than 0".to_string());
        }
        if self.feature_count == 0 {
            return fail("feature_count must be at least 1".to_string());
        }
        if self.filter_bank_size == 0 {
            return fail("filter_bank_size must be at least 1".to_string());
        }
        if self.feature_count > self.filter_bank_size {
            return fail(format!(
                "feature_count ({}) exceeds filter_bank_size ({})",
                self.feature_count, self.filter_bank_size
            ));
        }
        if !self.pre_emphasis.is_finite() {
            return fail("pre_emphasis must be finite".to_string());
        }
        if !self.sentinel.is_finite() {
            return fail("sentinel must be finite".to_string());
        }
        Ok(())
    }
}

/// Upload boundary settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// What the session forwards after recording
    pub mode: UploadMode,
    /// Multipart form field carrying the WAV file
    pub form_field_name: String,
    pub content_type: String,
    /// Send every retained vector instead of only the representative
    pub send_all_vectors: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            mode: UploadMode::ContainerFile,
            form_field_name: "voiceFile".to_string(),
            content_type: "audio/wav".to_string(),
            send_all_vectors: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or the
    /// JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/voiceprint_config.json")
    }
}
