use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque incremental-query cursor handed back by the health store.
///
/// The raw token's format belongs to the store; the pipeline only moves it
/// between the store and the settings row that persists it. An anchor is
/// persisted only after every sample fetched with it has been uploaded, so
/// a crash replays the batch instead of losing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAnchor(String);

impl QueryAnchor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_raw(self) -> String {
        self.0
    }
}

impl fmt::Display for QueryAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
