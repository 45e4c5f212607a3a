/// Upload transport and serialization errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("network request failed: {message}")]
    NetworkFailed { message: String },

    #[error("upload rejected with HTTP {status}: {body_snippet}")]
    HttpStatus { status: u16, body_snippet: String },

    #[error("service rejected {count} records after retry")]
    RecordsRejected { count: usize },

    #[error("session token rejected (HTTP 401)")]
    TokenExpired,

    #[error("upload task cancelled")]
    Cancelled,
}
