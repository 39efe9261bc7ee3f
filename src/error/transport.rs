// Transport error types surfaced by upload clients

use crate::error::ErrorCode;
use std::fmt;

/// Transport error code constants
///
/// Error code range: 3001-3003
pub struct TransportErrorCodes {}

impl TransportErrorCodes {
    pub const CONNECTION: i32 = 3001;
    pub const TIMEOUT: i32 = 3002;
    pub const REJECTED: i32 = 3003;
}

/// Errors raised by an [`UploadClient`](crate::upload::UploadClient)
///
/// The pipeline never inspects these beyond reporting them; they are passed
/// through to the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Request never reached the server
    Connection { reason: String },

    /// Request timed out
    Timeout,

    /// Server refused the request before a response body was produced
    Rejected { status_code: i32, reason: String },
}

impl ErrorCode for TransportError {
    fn code(&self) -> i32 {
        match self {
            TransportError::Connection { .. } => TransportErrorCodes::CONNECTION,
            TransportError::Timeout => TransportErrorCodes::TIMEOUT,
            TransportError::Rejected { .. } => TransportErrorCodes::REJECTED,
        }
    }

    fn message(&self) -> String {
        match self {
            TransportError::Connection { reason } => format!("Connection failed: {}", reason),
            TransportError::Timeout => "Upload timed out".to_string(),
            TransportError::Rejected {
                status_code,
                reason,
            } => format!("Upload rejected ({}): {}", status_code, reason),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransportError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for TransportError {}
