// Upload boundary - what leaves the device after a recording
//
// The transport itself (HTTP client, endpoint, auth) lives outside this
// crate behind the UploadClient trait. This module defines the request
// shapes, the wire encoding of feature vectors and the outcome triple
// reported back to callers.

mod recording;

pub use recording::RecordingUploadClient;

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::analysis::{FeatureVector, SelectedFeatures};
use crate::config::UploadConfig;
use crate::error::{
    CaptureError, ErrorCode, ExtractionError, TransportError, STATUS_LOCAL_FAILURE,
};

/// What a session forwards once recording has finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// Send the finished WAV file as a multipart form field
    ContainerFile,
    /// Extract MFCC vectors locally and send those
    FeatureVectors,
}

/// One feature vector as it appears in the upload body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEntry {
    /// Coefficients joined with ", "
    pub mfcc: String,
}

impl From<&FeatureVector> for FeatureEntry {
    fn from(vector: &FeatureVector) -> Self {
        Self {
            mfcc: vector.to_joined_string(),
        }
    }
}

/// Multipart description of a WAV upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerUpload {
    pub path: PathBuf,
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
}

/// Request handed to an [`UploadClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum UploadRequest {
    ContainerFile(ContainerUpload),
    FeatureVectors(Vec<FeatureEntry>),
}

impl UploadRequest {
    /// Multipart request for the WAV at `path`
    pub fn container_file(path: &Path, config: &UploadConfig) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.wav".to_string());

        UploadRequest::ContainerFile(ContainerUpload {
            path: path.to_path_buf(),
            field_name: config.form_field_name.clone(),
            file_name,
            content_type: config.content_type.clone(),
        })
    }

    /// Feature request: the representative only, or every retained vector
    pub fn feature_vectors(selected: &SelectedFeatures, send_all: bool) -> Self {
        let entries = if send_all {
            selected.vectors().iter().map(FeatureEntry::from).collect()
        } else {
            vec![FeatureEntry::from(selected.representative())]
        };
        UploadRequest::FeatureVectors(entries)
    }

    /// JSON body for feature uploads (`[{"mfcc": "..."}]`)
    ///
    /// Container uploads are multipart and have no JSON body.
    pub fn json_body(&self) -> Option<String> {
        match self {
            UploadRequest::FeatureVectors(entries) => serde_json::to_string(entries).ok(),
            UploadRequest::ContainerFile(_) => None,
        }
    }
}

/// What the remote service answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub status_code: i32,
    pub body: String,
}

/// Transport to the verification service
///
/// Implementations own timeouts, retries and encoding. Transport failures
/// come back as [`TransportError`] and are passed through to the caller.
pub trait UploadClient: Send + Sync + 'static {
    fn upload(&self, request: UploadRequest) -> BoxFuture<'_, Result<UploadResponse, TransportError>>;
}

/// Final `(success, status, message)` reported for a session
///
/// Negative statuses are local: -1 for any failure before or instead of the
/// transport answering, -2 when the clip had no usable frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub success: bool,
    pub status_code: i32,
    pub message: String,
}

impl UploadOutcome {
    pub fn from_response(response: UploadResponse) -> Self {
        Self {
            success: response.success,
            status_code: response.status_code,
            message: response.body,
        }
    }

    pub fn from_transport_error(err: &TransportError) -> Self {
        let status_code = match err {
            TransportError::Rejected { status_code, .. } => *status_code,
            _ => STATUS_LOCAL_FAILURE,
        };
        Self {
            success: false,
            status_code,
            message: err.message(),
        }
    }

    pub fn from_extraction_error(err: &ExtractionError) -> Self {
        Self {
            success: false,
            status_code: err.status_code(),
            message: err.message(),
        }
    }

    pub fn from_capture_error(err: &CaptureError) -> Self {
        Self {
            success: false,
            status_code: STATUS_LOCAL_FAILURE,
            message: err.message(),
        }
    }
}
