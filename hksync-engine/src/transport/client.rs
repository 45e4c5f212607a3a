//! reqwest-backed transport to the data-ingestion service.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, error};

use hksync_core::config::UploaderConfig;
use hksync_core::errors::{SyncResult, UploadError};
use hksync_core::traits::{ServiceConfig, UploadOutcome, UploadTransport};

use super::protocol;

/// Response-body characters echoed into logs and error snippets.
const BODY_SNIPPET_CHARS: usize = 256;

/// Blocking HTTP transport. The engine invokes it from blocking tasks only.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    service: Arc<dyn ServiceConfig>,
}

impl HttpTransport {
    pub fn new(config: &UploaderConfig, service: Arc<dyn ServiceConfig>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UploadError::NetworkFailed {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.service_url.trim_end_matches('/').to_string(),
            service,
        })
    }

    fn send(&self, method: Method, upload_id: &str, body: &[Value]) -> SyncResult<UploadOutcome> {
        // A missing token fails the same way a rejected one does; both end
        // in a credential refresh.
        let token = self
            .service
            .session_token()
            .ok_or(UploadError::TokenExpired)?;
        let url = format!("{}{}", self.base_url, protocol::data_set_path(upload_id));

        let response = self
            .client
            .request(method, &url)
            .header(protocol::SESSION_TOKEN_HEADER, token)
            .json(&body)
            .send()
            .map_err(|e| UploadError::NetworkFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(url = %url, records = body.len(), "upload request accepted");
            return Ok(UploadOutcome::Accepted);
        }

        let body_text = response.text().unwrap_or_default();
        let snippet: String = body_text.chars().take(BODY_SNIPPET_CHARS).collect();
        match status {
            StatusCode::BAD_REQUEST => {
                let indices = protocol::parse_rejected_indices(&body_text);
                if indices.is_empty() {
                    error!(status = %status, body = %snippet, "service rejected request without record pointers");
                    return Err(UploadError::HttpStatus {
                        status: status.as_u16(),
                        body_snippet: snippet,
                    }
                    .into());
                }
                for index in &indices {
                    error!(index, "service rejected record");
                }
                Ok(UploadOutcome::Rejected { indices })
            }
            StatusCode::UNAUTHORIZED => {
                error!("session token rejected with HTTP 401");
                Err(UploadError::TokenExpired.into())
            }
            _ => {
                error!(status = %status, body = %snippet, "upload request failed");
                Err(UploadError::HttpStatus {
                    status: status.as_u16(),
                    body_snippet: snippet,
                }
                .into())
            }
        }
    }
}

impl UploadTransport for HttpTransport {
    fn post_samples(&self, upload_id: &str, records: &[Value]) -> SyncResult<UploadOutcome> {
        self.send(Method::POST, upload_id, records)
    }

    fn delete_samples(&self, upload_id: &str, markers: &[Value]) -> SyncResult<UploadOutcome> {
        self.send(Method::DELETE, upload_id, markers)
    }
}
