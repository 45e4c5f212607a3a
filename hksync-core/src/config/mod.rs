pub mod defaults;

use serde::{Deserialize, Serialize};

/// Upload pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploaderConfig {
    /// Data-ingestion service base URL.
    pub service_url: String,
    /// Seconds before an upload HTTP request times out.
    pub request_timeout_secs: u64,
    /// Days before "now" that a fresh `Current` sync starts reading from.
    pub current_lookback_days: i64,
    /// Prefix for per-pipeline upload session identifiers.
    pub session_id_prefix: String,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            service_url: defaults::DEFAULT_SERVICE_URL.to_string(),
            request_timeout_secs: defaults::DEFAULT_REQUEST_TIMEOUT_SECS,
            current_lookback_days: defaults::DEFAULT_CURRENT_LOOKBACK_DAYS,
            session_id_prefix: defaults::DEFAULT_SESSION_ID_PREFIX.to_string(),
        }
    }
}

impl UploaderConfig {
    /// Parse a TOML document; absent fields fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Render the full configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
