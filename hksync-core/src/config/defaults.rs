/// Data-ingestion service base URL.
pub const DEFAULT_SERVICE_URL: &str = "https://api.hksync.org";

/// HTTP request timeout for upload calls (seconds).
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Days before "now" that a fresh `Current` sync starts reading from.
pub const DEFAULT_CURRENT_LOOKBACK_DAYS: i64 = 7;

/// Prefix for per-pipeline upload session identifiers.
pub const DEFAULT_SESSION_ID_PREFIX: &str = "org.hksync.upload";
