//! food records: net carbohydrates plus an optional food name.

use serde_json::{json, Value};
use tracing::error;

use hksync_core::constants::METADATA_FOOD_TYPE;
use hksync_core::types::HealthSample;

use super::{attach_metadata_payload, record_envelope, truncate_name};

pub(crate) fn prepare(sample: &HealthSample) -> Option<Value> {
    let mut record = record_envelope(sample);
    record.insert("type".to_string(), json!("food"));

    // An implausible gram count skips the nutrition block; the record
    // still uploads.
    if sample.value.is_finite() && (0.0..=1000.0).contains(&sample.value) {
        record.insert(
            "nutrition".to_string(),
            json!({
                "carbohydrate": { "net": sample.value, "units": "grams" },
            }),
        );
    } else {
        error!(
            origin_id = %sample.id,
            grams = sample.value,
            "carb grams outside [0, 1000]; uploading without nutrition"
        );
    }

    let mut consumed: Vec<&str> = Vec::new();
    if let Some(food) = sample.metadata_str(METADATA_FOOD_TYPE) {
        record.insert("name".to_string(), json!(truncate_name(food, 100)));
        consumed.push(METADATA_FOOD_TYPE);
    }
    attach_metadata_payload(&mut record, sample, &consumed);
    Some(Value::Object(record))
}
