// Capture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Capture error code constants
///
/// Single source of truth for the numeric codes reported by the recording
/// side of the pipeline.
///
/// Error code range: 1001-1008
pub struct CaptureErrorCodes {}

impl CaptureErrorCodes {
    /// Input device could not be acquired
    pub const DEVICE_INIT: i32 = 1001;

    /// A recording session is already active
    pub const ALREADY_RECORDING: i32 = 1002;

    /// No recording session is active
    pub const NOT_RECORDING: i32 = 1003;

    /// Write, seek or flush failed on the output file
    pub const IO: i32 = 1004;

    /// Input stream failed mid-session
    pub const STREAM_FAILURE: i32 = 1005;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Capture worker did not exit before the shutdown deadline
    pub const SHUTDOWN_TIMEOUT: i32 = 1007;

    /// Capture configuration is unusable
    pub const INVALID_CONFIG: i32 = 1008;
}

/// Log a capture error with structured context
///
/// Logs the numeric code, the component and the message. The logging is
/// non-blocking and will not panic on failure.
pub fn log_capture_error(err: &CaptureError, context: &str) {
    error!(
        "Capture error in {}: code={}, component=CaptureController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Capture-related errors
///
/// These errors cover device acquisition, the recording lifecycle and the
/// streaming container writer.
///
/// Error code range: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Input device unavailable; fatal to the start attempt
    DeviceInit { reason: String },

    /// `start` called while a session is recording
    AlreadyRecording,

    /// `stop` called with no active session
    NotRecording,

    /// Output file could not be created, written, or patched
    Io { details: String },

    /// Input stream failed after the session started
    StreamFailure { reason: String },

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Worker still running after the shutdown deadline
    ShutdownTimeout { waited_ms: u64 },

    /// Capture configuration rejected
    InvalidConfig { reason: String },
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::DeviceInit { .. } => CaptureErrorCodes::DEVICE_INIT,
            CaptureError::AlreadyRecording => CaptureErrorCodes::ALREADY_RECORDING,
            CaptureError::NotRecording => CaptureErrorCodes::NOT_RECORDING,
            CaptureError::Io { .. } => CaptureErrorCodes::IO,
            CaptureError::StreamFailure { .. } => CaptureErrorCodes::STREAM_FAILURE,
            CaptureError::LockPoisoned { .. } => CaptureErrorCodes::LOCK_POISONED,
            CaptureError::ShutdownTimeout { .. } => CaptureErrorCodes::SHUTDOWN_TIMEOUT,
            CaptureError::InvalidConfig { .. } => CaptureErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::DeviceInit { reason } => {
                format!("Failed to initialize capture device: {}", reason)
            }
            CaptureError::AlreadyRecording => {
                "Recording already in progress. Call stop() first.".to_string()
            }
            CaptureError::NotRecording => {
                "No recording in progress. Call start() first.".to_string()
            }
            CaptureError::Io { details } => format!("I/O error: {}", details),
            CaptureError::StreamFailure { reason } => {
                format!("Capture stream failed: {}", reason)
            }
            CaptureError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            CaptureError::ShutdownTimeout { waited_ms } => {
                format!("Capture worker still running after {} ms", waited_ms)
            }
            CaptureError::InvalidConfig { reason } => {
                format!("Invalid capture configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CaptureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_codes() {
        assert_eq!(
            CaptureError::DeviceInit {
                reason: "test".to_string()
            }
            .code(),
            CaptureErrorCodes::DEVICE_INIT
        );
        assert_eq!(
            CaptureError::AlreadyRecording.code(),
            CaptureErrorCodes::ALREADY_RECORDING
        );
        assert_eq!(
            CaptureError::NotRecording.code(),
            CaptureErrorCodes::NOT_RECORDING
        );
        assert_eq!(
            CaptureError::Io {
                details: "test".to_string()
            }
            .code(),
            1004
        );
        assert_eq!(
            CaptureError::ShutdownTimeout { waited_ms: 10 }.code(),
            1007
        );
        assert_eq!(
            CaptureError::InvalidConfig {
                reason: "test".to_string()
            }
            .code(),
            1008
        );
    }

    #[test]
    fn test_capture_error_messages() {
        let err = CaptureError::DeviceInit {
            reason: "no default input device".to_string(),
        };
        assert_eq!(
            err.message(),
            "Failed to initialize capture device: no default input device"
        );

        let err = CaptureError::AlreadyRecording;
        assert!(err.message().contains("already in progress"));

        let err = CaptureError::ShutdownTimeout { waited_ms: 250 };
        assert!(err.message().contains("250 ms"));
    }

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::NotRecording;
        let display = format!("{}", err);
        assert!(display.contains("CaptureError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::other("disk full");
        let capture_err: CaptureError = io_err.into();
        match capture_err {
            CaptureError::Io { details } => assert!(details.contains("disk full")),
            _ => panic!("Expected Io"),
        }
    }
}
