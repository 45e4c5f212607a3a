use serde_json::Value;

use crate::errors::SyncResult;

/// Result of one POST/DELETE round-trip the pipeline can act on.
///
/// Failures the pipeline cannot act on per-record (network, 401, other
/// non-2xx) surface as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 2xx; the service accepted every record.
    Accepted,
    /// 400 with per-record pointers; the listed body indices were rejected.
    Rejected { indices: Vec<usize> },
}

/// Authenticated HTTP boundary to the data-ingestion service.
///
/// Implementations are blocking; the engine runs them on blocking tasks.
pub trait UploadTransport: Send + Sync {
    /// POST a JSON array of sample records to the upload endpoint.
    fn post_samples(&self, upload_id: &str, records: &[Value]) -> SyncResult<UploadOutcome>;

    /// DELETE a JSON array of deletion markers from the upload endpoint.
    fn delete_samples(&self, upload_id: &str, markers: &[Value]) -> SyncResult<UploadOutcome>;
}
