use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{UploadClient, UploadRequest, UploadResponse};
use crate::error::TransportError;

/// In-memory client that keeps every request and replies with a fixed answer
///
/// Stands in for the real transport in tests and offline CLI runs.
pub struct RecordingUploadClient {
    reply: Result<UploadResponse, TransportError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<UploadRequest>>,
}

impl RecordingUploadClient {
    pub fn new(reply: Result<UploadResponse, TransportError>) -> Self {
        Self {
            reply,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Client answering `200 OK` with `body`
    pub fn accepting(body: &str) -> Self {
        Self::new(Ok(UploadResponse {
            success: true,
            status_code: 200,
            body: body.to_string(),
        }))
    }

    pub fn failing(err: TransportError) -> Self {
        Self::new(Err(err))
    }

    /// Wait `delay` before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<UploadRequest> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl UploadClient for RecordingUploadClient {
    fn upload(&self, request: UploadRequest) -> BoxFuture<'_, Result<UploadResponse, TransportError>> {
        async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.requests.lock() {
                Ok(mut requests) => requests.push(request),
                Err(poisoned) => poisoned.into_inner().push(request),
            }
            tracing::debug!("[RecordingUploadClient] Request recorded");
            self.reply.clone()
        }
        .boxed()
    }
}
