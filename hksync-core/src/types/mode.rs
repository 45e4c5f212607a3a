use serde::{Deserialize, Serialize};
use std::fmt;

/// Which sync pipeline a reader/uploader/stats triple belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncMode {
    /// Live forward sync of new data via anchored queries.
    Current,
    /// One-time backfill of older data, consumed newest-first.
    HistoricalAll,
}

impl SyncMode {
    pub const ALL: [SyncMode; 2] = [SyncMode::Current, SyncMode::HistoricalAll];

    /// Stable identifier used in settings scopes and session names.
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Current => "Current",
            SyncMode::HistoricalAll => "HistoricalAll",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a reading cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// A read or upload failed; the message describes the failure.
    Error { message: String },
    /// Externally forced stop (interface disabled or user switched).
    /// Never surfaced as a notification.
    TurnedOff,
    /// The store had nothing new past the current anchor/fence.
    WithNoNewResults,
    /// Stopped after delivering results (one-batch background cycle).
    WithResults,
}

impl StopReason {
    pub fn is_error(&self) -> bool {
        matches!(self, StopReason::Error { .. })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Error { message } => write!(f, "error: {message}"),
            StopReason::TurnedOff => f.write_str("turnedOff"),
            StopReason::WithNoNewResults => f.write_str("withNoNewResults"),
            StopReason::WithResults => f.write_str("withResults"),
        }
    }
}

/// App execution phase, as reported by the host lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppPhase {
    Foreground,
    Background,
}
