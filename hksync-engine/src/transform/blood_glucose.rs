//! cbg/smbg records: CGM source matching, out-of-range annotations.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use hksync_core::constants::{METADATA_RECEIVER_DISPLAY_TIME, METADATA_WAS_USER_ENTERED};
use hksync_core::types::HealthSample;

use super::{attach_metadata_payload, format_device_time, record_envelope, skip_record};

/// Source names that mark a sample as a CGM feed regardless of bundle id.
const CGM_SOURCE_NAMES: [&str; 3] = ["loop", "bgmtool", "dexcom"];
/// Bundle ids that mark a sample as a CGM feed.
const CGM_BUNDLE_IDS: [&str; 2] = ["org.nightscoutfoundation.spike", "com.spike-app.spike"];

pub(crate) fn filter(samples: Vec<HealthSample>) -> Vec<HealthSample> {
    // No exclusion rules today; value checks happen at prepare time.
    samples
}

pub(crate) fn prepare(sample: &HealthSample) -> Option<Value> {
    if !sample.value.is_finite() || sample.value < 0.0 || sample.value > 1000.0 {
        return skip_record(sample, "glucose value outside [0, 1000]");
    }

    let cgm = is_cgm_source(sample);
    let mut record = record_envelope(sample);
    record.insert("type".to_string(), json!(if cgm { "cbg" } else { "smbg" }));
    record.insert("units".to_string(), json!("mg/dL"));

    // Dexcom transmitters report out-of-range readings as hard limits; the
    // service wants them annotated and clamped just past the threshold.
    let mut value = sample.value;
    if is_dexcom_source(sample) {
        if value < 40.0 {
            record.insert(
                "annotations".to_string(),
                json!([{ "code": "bg/out-of-range", "value": "low", "threshold": 40 }]),
            );
            value = 39.0;
        } else if value > 400.0 {
            record.insert(
                "annotations".to_string(),
                json!([{ "code": "bg/out-of-range", "value": "high", "threshold": 400 }]),
            );
            value = 401.0;
        }
    }
    record.insert("value".to_string(), json!(value));

    if !cgm && sample.metadata_bool(METADATA_WAS_USER_ENTERED).unwrap_or(false) {
        record.insert("subType".to_string(), json!("manual"));
    }

    if let Some(raw) = sample.metadata_str(METADATA_RECEIVER_DISPLAY_TIME) {
        if let Ok(display_time) = raw.parse::<DateTime<Utc>>() {
            record.insert(
                "deviceTime".to_string(),
                json!(format_device_time(display_time)),
            );
        }
    }

    attach_metadata_payload(&mut record, sample, &[METADATA_RECEIVER_DISPLAY_TIME]);
    Some(Value::Object(record))
}

fn is_cgm_source(sample: &HealthSample) -> bool {
    let name = sample.source.name.to_lowercase();
    if CGM_SOURCE_NAMES.contains(&name.as_str()) || name.starts_with("dexcom") {
        return true;
    }
    let bundle = sample.source.bundle_id.to_lowercase();
    CGM_BUNDLE_IDS.contains(&bundle.as_str())
        || bundle.starts_with("com.dexcom")
        || bundle.ends_with(".loop")
        || bundle.ends_with("xdripreader")
        || bundle.split('.').any(|part| part == "loopkit")
}

fn is_dexcom_source(sample: &HealthSample) -> bool {
    sample.source.name.to_lowercase().starts_with("dexcom")
        || sample.source.bundle_id.to_lowercase().starts_with("com.dexcom")
}
