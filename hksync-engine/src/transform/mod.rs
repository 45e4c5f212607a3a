//! Per-kind wire preparation: the closed capability set for sample kinds.
//!
//! Every record shares the `time`/`origin`/`payload` envelope; each kind
//! contributes its own fields and validation. Invalid records are logged and
//! skipped, never failing the batch they ride in.

mod blood_glucose;
mod carb;
mod insulin;
mod workout;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::error;

use hksync_core::constants::{DEVICE_TIME_FORMAT, WIRE_TIME_FORMAT};
use hksync_core::types::{DeletedSample, HealthSample, SampleKind};

/// What a sample kind knows how to do: exclusion rules and wire-record
/// preparation for uploads and deletes.
pub trait SampleTransform {
    /// Drop samples this kind never uploads.
    fn filter_samples(&self, samples: Vec<HealthSample>) -> Vec<HealthSample>;
    /// Wire records for an upload body, in sample order minus skips.
    fn prepare_data_for_upload(&self, samples: &[HealthSample]) -> Vec<Value>;
    /// Deletion markers for a delete body.
    fn prepare_data_for_delete(&self, deletes: &[DeletedSample]) -> Vec<Value>;
}

impl SampleTransform for SampleKind {
    fn filter_samples(&self, samples: Vec<HealthSample>) -> Vec<HealthSample> {
        match self {
            SampleKind::BloodGlucose => blood_glucose::filter(samples),
            SampleKind::Insulin | SampleKind::Carb | SampleKind::Workout => samples,
        }
    }

    fn prepare_data_for_upload(&self, samples: &[HealthSample]) -> Vec<Value> {
        samples
            .iter()
            .filter_map(|sample| match self {
                SampleKind::BloodGlucose => blood_glucose::prepare(sample),
                SampleKind::Insulin => insulin::prepare(sample),
                SampleKind::Carb => carb::prepare(sample),
                SampleKind::Workout => workout::prepare(sample),
            })
            .collect()
    }

    fn prepare_data_for_delete(&self, deletes: &[DeletedSample]) -> Vec<Value> {
        deletes
            .iter()
            .map(|marker| json!({ "origin": { "id": marker.id.to_string() } }))
            .collect()
    }
}

/// The `time` and `origin` fields every record starts from.
pub(crate) fn record_envelope(sample: &HealthSample) -> Map<String, Value> {
    let mut source = Map::new();
    source.insert(
        "bundleIdentifier".to_string(),
        json!(sample.source.bundle_id),
    );
    source.insert("name".to_string(), json!(sample.source.name));

    let mut source_revision = Map::new();
    source_revision.insert("source".to_string(), Value::Object(source));
    if let Some(version) = &sample.source.version {
        source_revision.insert("version".to_string(), json!(version));
    }

    let mut record = Map::new();
    record.insert("time".to_string(), json!(format_wire_time(sample.start)));
    record.insert(
        "origin".to_string(),
        json!({
            "id": sample.id.to_string(),
            "name": "com.apple.HealthKit",
            "type": "service",
            "payload": { "sourceRevision": Value::Object(source_revision) },
        }),
    );
    record
}

/// Remaining sample metadata becomes `payload`, minus `consumed` keys.
/// Omitted entirely when nothing is left.
pub(crate) fn attach_metadata_payload(
    record: &mut Map<String, Value>,
    sample: &HealthSample,
    consumed: &[&str],
) {
    let payload: Map<String, Value> = sample
        .metadata
        .iter()
        .filter(|(key, _)| !consumed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if !payload.is_empty() {
        record.insert("payload".to_string(), Value::Object(payload));
    }
}

pub(crate) fn format_wire_time(time: DateTime<Utc>) -> String {
    time.format(WIRE_TIME_FORMAT).to_string()
}

/// Device-local timestamp: same clock face, no zone suffix.
pub(crate) fn format_device_time(time: DateTime<Utc>) -> String {
    time.format(DEVICE_TIME_FORMAT).to_string()
}

pub(crate) fn truncate_name(name: &str, max_chars: usize) -> String {
    name.chars().take(max_chars).collect()
}

/// Log the skip with the record's origin id and drop it.
pub(crate) fn skip_record(sample: &HealthSample, reason: &str) -> Option<Value> {
    error!(origin_id = %sample.id, reason, "dropping record that cannot be uploaded");
    None
}
