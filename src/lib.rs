// Voiceprint Core - voice capture and MFCC feature extraction
// Streaming WAV capture with a cooperative stop flag, plus a windowed DSP
// pipeline that reduces a clip to a few distinct feature vectors for upload.

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod upload;

// Re-exports for convenience
pub use analysis::{ClipExtractor, FeatureVector, SelectedFeatures};
pub use audio::{CaptureController, CaptureSummary, CpalPcmDevice, SyntheticPcmDevice};
pub use config::AppConfig;
pub use session::VoiceprintSession;
pub use upload::{UploadClient, UploadMode, UploadOutcome, UploadRequest};

/// Install a `tracing` fmt subscriber honoring `RUST_LOG`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
