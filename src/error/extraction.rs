// Extraction error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Status reported to upload callers when nothing usable came out of a clip
pub const STATUS_EMPTY_FEATURE_SET: i32 = -2;

/// Status reported to upload callers for any other local failure
pub const STATUS_LOCAL_FAILURE: i32 = -1;

/// Extraction error code constants
///
/// Error code range: 2001-2006
pub struct ExtractionErrorCodes {}

impl ExtractionErrorCodes {
    /// Frame, hop or MFCC parameters are unusable
    pub const CONFIGURATION: i32 = 2001;

    /// No valid, non-sentinel frame in the whole clip
    pub const EMPTY_FEATURE_SET: i32 = 2002;

    /// Container header is malformed or was never finalized
    pub const INVALID_CONTAINER: i32 = 2003;

    /// Reading the clip failed
    pub const IO: i32 = 2004;

    /// Clip file does not exist
    pub const FILE_NOT_FOUND: i32 = 2005;

    /// Another extraction is already running on this session
    pub const BUSY: i32 = 2006;
}

/// Log an extraction error with structured context
pub fn log_extraction_error(err: &ExtractionError, context: &str) {
    error!(
        "Extraction error in {}: code={}, component=ClipExtractor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Feature-extraction errors
///
/// Error code range: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Rejected before any processing begins
    Configuration { reason: String },

    /// Every frame was sentinel-marked (or the clip had no full frame)
    EmptyFeatureSet,

    /// Container could not be parsed
    InvalidContainer { reason: String },

    /// Reading the clip failed
    Io { details: String },

    /// Clip file does not exist
    FileNotFound { path: String },

    /// Extraction already in progress
    Busy,
}

impl ExtractionError {
    /// Negative status surfaced to upload callers in place of an HTTP code
    ///
    /// An empty feature set gets its own status so callers can tell
    /// "nothing was said" apart from a broken pipeline.
    pub fn status_code(&self) -> i32 {
        match self {
            ExtractionError::EmptyFeatureSet => STATUS_EMPTY_FEATURE_SET,
            _ => STATUS_LOCAL_FAILURE,
        }
    }
}

impl ErrorCode for ExtractionError {
    fn code(&self) -> i32 {
        match self {
            ExtractionError::Configuration { .. } => ExtractionErrorCodes::CONFIGURATION,
            ExtractionError::EmptyFeatureSet => ExtractionErrorCodes::EMPTY_FEATURE_SET,
            ExtractionError::InvalidContainer { .. } => ExtractionErrorCodes::INVALID_CONTAINER,
            ExtractionError::Io { .. } => ExtractionErrorCodes::IO,
            ExtractionError::FileNotFound { .. } => ExtractionErrorCodes::FILE_NOT_FOUND,
            ExtractionError::Busy => ExtractionErrorCodes::BUSY,
        }
    }

    fn message(&self) -> String {
        match self {
            ExtractionError::Configuration { reason } => {
                format!("Invalid extraction configuration: {}", reason)
            }
            ExtractionError::EmptyFeatureSet => {
                "No valid frames found in clip (all frames silent or sentinel-marked)".to_string()
            }
            ExtractionError::InvalidContainer { reason } => {
                format!("Invalid WAV container: {}", reason)
            }
            ExtractionError::Io { details } => format!("I/O error: {}", details),
            ExtractionError::FileNotFound { path } => format!("File not found: {}", path),
            ExtractionError::Busy => "Extraction already in progress".to_string(),
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExtractionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ExtractionError {}

impl From<std::io::Error> for ExtractionError {
    fn from(err: std::io::Error) -> Self {
        ExtractionError::Io {
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_error_codes() {
        assert_eq!(
            ExtractionError::Configuration {
                reason: "test".to_string()
            }
            .code(),
            ExtractionErrorCodes::CONFIGURATION
        );
        assert_eq!(ExtractionError::EmptyFeatureSet.code(), 2002);
        assert_eq!(
            ExtractionError::InvalidContainer {
                reason: "test".to_string()
            }
            .code(),
            2003
        );
        assert_eq!(
            ExtractionError::FileNotFound {
                path: "a.wav".to_string()
            }
            .code(),
            2005
        );
        assert_eq!(ExtractionError::Busy.code(), 2006);
    }

    #[test]
    fn test_empty_feature_set_has_distinct_status() {
        assert_eq!(
            ExtractionError::EmptyFeatureSet.status_code(),
            STATUS_EMPTY_FEATURE_SET
        );
        assert_eq!(
            ExtractionError::FileNotFound {
                path: "a.wav".to_string()
            }
            .status_code(),
            STATUS_LOCAL_FAILURE
        );
        assert!(STATUS_EMPTY_FEATURE_SET < 0);
        assert_ne!(STATUS_EMPTY_FEATURE_SET, STATUS_LOCAL_FAILURE);
    }

    #[test]
    fn test_extraction_error_display() {
        let err = ExtractionError::EmptyFeatureSet;
        let display = format!("{}", err);
        assert!(display.contains("ExtractionError"));
        assert!(display.contains("2002"));
    }
}
