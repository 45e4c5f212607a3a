//! physicalActivity records: duration, distance, energy, display name.

use serde_json::{json, Value};
use tracing::error;

use hksync_core::types::HealthSample;

use super::{attach_metadata_payload, record_envelope, skip_record, truncate_name};

const MAX_DURATION_SECS: f64 = 7.0 * 24.0 * 3600.0;
const MAX_DISTANCE_MILES: f64 = 100.0;
const MAX_ENERGY_KCAL: f64 = 10_000.0;

pub(crate) fn prepare(sample: &HealthSample) -> Option<Value> {
    let Some(workout) = &sample.workout else {
        return skip_record(sample, "workout sample without workout detail");
    };

    let mut record = record_envelope(sample);
    record.insert("type".to_string(), json!("physicalActivity"));

    // Out-of-range quantities skip their field but never drop the record.
    if workout.duration_secs.is_finite()
        && workout.duration_secs >= 0.0
        && workout.duration_secs < MAX_DURATION_SECS
    {
        record.insert(
            "duration".to_string(),
            json!({ "units": "seconds", "value": workout.duration_secs }),
        );
    } else {
        error!(
            origin_id = %sample.id,
            secs = workout.duration_secs,
            "workout duration outside [0, 1 week); skipping field"
        );
    }

    let mut valid_distance = None;
    if let Some(miles) = workout.distance_miles {
        if miles.is_finite() && (0.0..=MAX_DISTANCE_MILES).contains(&miles) {
            record.insert(
                "distance".to_string(),
                json!({ "units": "miles", "value": miles }),
            );
            valid_distance = Some(miles);
        } else {
            error!(
                origin_id = %sample.id,
                miles,
                "workout distance outside [0, 100] miles; skipping field"
            );
        }
    }

    if let Some(kcal) = workout.energy_kcal {
        if kcal.is_finite() && (0.0..=MAX_ENERGY_KCAL).contains(&kcal) {
            record.insert(
                "energy".to_string(),
                json!({ "units": "kilocalories", "value": kcal }),
            );
        } else {
            error!(
                origin_id = %sample.id,
                kcal,
                "workout energy outside [0, 10000] kcal; skipping field"
            );
        }
    }

    let name = match valid_distance {
        Some(miles) => format!("{} - {:.2} miles", workout.activity, miles),
        None => workout.activity.clone(),
    };
    record.insert("name".to_string(), json!(truncate_name(&name, 100)));

    attach_metadata_payload(&mut record, sample, &[]);
    Some(Value::Object(record))
}
