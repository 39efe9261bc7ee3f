// Audio module - live capture and the streaming WAV container

pub mod capture;
pub mod format;
pub mod import;
pub mod microphone;
pub mod source;
pub mod synthetic;
pub mod wav_writer;

// Re-export commonly used types for convenience
pub use capture::{
    CaptureCompletion, CaptureController, CaptureState, CaptureSummary, StopReason, StopSignal,
};
pub use format::{decode_pcm16, encode_pcm16, AudioStreamConfig, ContainerHeader, HEADER_LEN};
pub use import::{import_wav, ImportedClip};
pub use microphone::CpalPcmDevice;
pub use source::{PcmDevice, PcmSource};
pub use synthetic::{SyntheticPcmDevice, SyntheticProbe, SyntheticSignal};
pub use wav_writer::StreamingContainerWriter;
