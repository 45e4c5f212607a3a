use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a sample came from, as recorded by the on-device store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleSource {
    /// Reverse-DNS bundle identifier of the writing app.
    pub bundle_id: String,
    /// Human-readable source name.
    pub name: String,
    pub version: Option<String>,
}

/// Workout-specific quantities; present only on workout samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDetail {
    /// Display name of the activity ("Running", "Cycling", ...).
    pub activity: String,
    pub duration_secs: f64,
    pub distance_miles: Option<f64>,
    pub energy_kcal: Option<f64>,
}

/// One health sample as read from the on-device store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSample {
    pub id: Uuid,
    /// Sample start time; becomes the wire `time` field.
    pub start: DateTime<Utc>,
    /// Sample end time; equals `start` for instantaneous samples.
    pub end: DateTime<Utc>,
    /// Primary quantity in the kind's native unit (mg/dL, units, grams).
    /// Unused for workouts, which carry their quantities in `workout`.
    pub value: f64,
    pub source: SampleSource,
    /// Store metadata keyed by the store's metadata keys.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub workout: Option<WorkoutDetail>,
}

impl HealthSample {
    /// Metadata value as a string, if present and a string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Metadata value as an integer, if present and numeric.
    pub fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| v.as_i64())
    }

    /// Metadata value as a float, if present and numeric.
    pub fn metadata_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.as_f64())
    }

    /// Metadata value as a bool, if present and boolean.
    pub fn metadata_bool(&self, key: &str) -> Option<bool> {
        self.metadata.get(key).and_then(|v| v.as_bool())
    }
}

/// Marker for a sample deleted from the store since the last anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedSample {
    pub id: Uuid,
}

/// Closed time range over sample start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDateRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl SampleDateRange {
    pub fn new(earliest: DateTime<Utc>, latest: DateTime<Utc>) -> Self {
        Self { earliest, latest }
    }

    /// Grow the range to include `time`.
    pub fn extend(&mut self, time: DateTime<Utc>) {
        if time < self.earliest {
            self.earliest = time;
        }
        if time > self.latest {
            self.latest = time;
        }
    }
}
