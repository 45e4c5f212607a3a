//! basal/bolus records keyed off the store's delivery-reason metadata.

use serde_json::{json, Value};

use hksync_core::constants::{
    INSULIN_REASON_BASAL, INSULIN_REASON_BOLUS, METADATA_INSULIN_DELIVERY_REASON,
    METADATA_SCHEDULED_BASAL_RATE,
};
use hksync_core::types::HealthSample;

use super::{attach_metadata_payload, record_envelope, skip_record};

/// Longest plausible basal span. Anything past this is store corruption.
const MAX_BASAL_DURATION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

pub(crate) fn prepare(sample: &HealthSample) -> Option<Value> {
    if !sample.value.is_finite() {
        return skip_record(sample, "insulin units not finite");
    }
    match sample.metadata_i64(METADATA_INSULIN_DELIVERY_REASON) {
        Some(INSULIN_REASON_BASAL) => prepare_basal(sample),
        Some(INSULIN_REASON_BOLUS) => prepare_bolus(sample),
        _ => skip_record(sample, "missing or unknown insulin delivery reason"),
    }
}

fn prepare_basal(sample: &HealthSample) -> Option<Value> {
    let duration_ms = (sample.end - sample.start).num_milliseconds();
    if duration_ms <= 0 || duration_ms > MAX_BASAL_DURATION_MS {
        return skip_record(sample, "basal duration outside (0, 7 days]");
    }
    let duration_hours = duration_ms as f64 / 3_600_000.0;
    let rate = sample.value / duration_hours;
    if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
        return skip_record(sample, "basal rate outside [0, 100] units/hour");
    }

    let mut record = record_envelope(sample);
    record.insert("type".to_string(), json!("basal"));
    record.insert("deliveryType".to_string(), json!("temp"));
    record.insert("duration".to_string(), json!(duration_ms));
    record.insert("rate".to_string(), json!(rate));
    if let Some(scheduled) = sample.metadata_f64(METADATA_SCHEDULED_BASAL_RATE) {
        record.insert(
            "suppressed".to_string(),
            json!({
                "type": "basal",
                "deliveryType": "scheduled",
                "rate": scheduled,
            }),
        );
    }
    attach_metadata_payload(&mut record, sample, &[]);
    Some(Value::Object(record))
}

fn prepare_bolus(sample: &HealthSample) -> Option<Value> {
    if !(0.0..=100.0).contains(&sample.value) {
        return skip_record(sample, "bolus units outside [0, 100]");
    }
    let mut record = record_envelope(sample);
    record.insert("type".to_string(), json!("bolus"));
    record.insert("subType".to_string(), json!("normal"));
    record.insert("normal".to_string(), json!(sample.value));
    attach_metadata_payload(&mut record, sample, &[]);
    Some(Value::Object(record))
}
