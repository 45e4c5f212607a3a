//! Recording upload transport with scripted replies.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Value;

use hksync_core::errors::{SyncResult, UploadError};
use hksync_core::traits::{UploadOutcome, UploadTransport};

/// What the next transport call should return.
#[derive(Debug, Clone)]
pub enum TransportReply {
    Accept,
    Reject(Vec<usize>),
    Http(u16),
    Network(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMethod {
    Post,
    Delete,
}

/// One observed transport call, bodies included.
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub method: CallMethod,
    pub upload_id: String,
    pub bodies: Vec<Value>,
}

/// Transport double that records every call in order and answers from a
/// scripted reply queue (default: accept everything).
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    replies: Mutex<VecDeque<TransportReply>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply for the next unanswered call.
    pub fn script(&self, reply: TransportReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Every call so far, in wire order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn post_count(&self) -> usize {
        self.count(CallMethod::Post)
    }

    pub fn delete_count(&self) -> usize {
        self.count(CallMethod::Delete)
    }

    fn count(&self, method: CallMethod) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    fn answer(
        &self,
        method: CallMethod,
        upload_id: &str,
        bodies: &[Value],
    ) -> SyncResult<UploadOutcome> {
        self.calls.lock().unwrap().push(TransportCall {
            method,
            upload_id: upload_id.to_string(),
            bodies: bodies.to_vec(),
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TransportReply::Accept);
        match reply {
            TransportReply::Accept => Ok(UploadOutcome::Accepted),
            TransportReply::Reject(indices) => Ok(UploadOutcome::Rejected { indices }),
            TransportReply::Http(401) => Err(UploadError::TokenExpired.into()),
            TransportReply::Http(status) => Err(UploadError::HttpStatus {
                status,
                body_snippet: "scripted failure".to_string(),
            }
            .into()),
            TransportReply::Network(message) => Err(UploadError::NetworkFailed { message }.into()),
        }
    }
}

impl UploadTransport for RecordingTransport {
    fn post_samples(&self, upload_id: &str, records: &[Value]) -> SyncResult<UploadOutcome> {
        self.answer(CallMethod::Post, upload_id, records)
    }

    fn delete_samples(&self, upload_id: &str, markers: &[Value]) -> SyncResult<UploadOutcome> {
        self.answer(CallMethod::Delete, upload_id, markers)
    }
}
