// Error types for the voiceprint pipeline
//
// This module defines custom error types for capture, extraction and upload
// operations, providing structured error handling with numeric codes that
// callers on the far side of the capture boundary can switch on.

mod capture;
mod extraction;
mod transport;

pub use capture::{log_capture_error, CaptureError, CaptureErrorCodes};
pub use extraction::{
    log_extraction_error, ExtractionError, ExtractionErrorCodes, STATUS_EMPTY_FEATURE_SET,
    STATUS_LOCAL_FAILURE,
};
pub use transport::{TransportError, TransportErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the capture, extraction and upload layers.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
