use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whole-day difference between two instants, truncated toward zero.
pub fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days()
}

/// Per-(kind, mode) progress snapshot, read by UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Cumulative samples confirmed uploaded. Never decreases.
    pub total_upload_count: u64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_attempt_count: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Start-time bounds of the last confirmed batch.
    pub last_success_earliest: Option<DateTime<Utc>>,
    pub last_success_latest: Option<DateTime<Utc>>,
    /// Historical only: full day span to backfill.
    pub total_days: i64,
    /// Historical only: days of the span completed so far.
    pub current_day: i64,
}

/// Whole-interface progress combining every pipeline's persisted state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalProgress {
    pub last_current_upload_at: Option<DateTime<Utc>>,
    pub total_days_historical: i64,
    pub current_day_historical: i64,
}

impl GlobalProgress {
    /// Completed fraction of the historical backfill, in [0.0, 1.0].
    pub fn historical_fraction(&self) -> f64 {
        if self.total_days_historical <= 0 {
            return 0.0;
        }
        let fraction = self.current_day_historical as f64 / self.total_days_historical as f64;
        fraction.clamp(0.0, 1.0)
    }
}
