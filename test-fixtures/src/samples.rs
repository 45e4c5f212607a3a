//! Builders for samples in each kind's native shape.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use hksync_core::constants::{
    METADATA_FOOD_TYPE, METADATA_INSULIN_DELIVERY_REASON, METADATA_SCHEDULED_BASAL_RATE,
    METADATA_WAS_USER_ENTERED,
};
use hksync_core::types::{DeletedSample, HealthSample, SampleSource, WorkoutDetail};

/// Fixed point all fixture timestamps offset from: 2021-06-01T00:00:00Z.
pub fn base_time() -> DateTime<Utc> {
    DateTime::from_timestamp(1_622_505_600, 0).unwrap()
}

/// `base_time()` plus `secs`.
pub fn ts(secs: i64) -> DateTime<Utc> {
    base_time() + Duration::seconds(secs)
}

/// Source stamped on fixture samples unless a builder overrides it.
pub fn default_source() -> SampleSource {
    SampleSource {
        bundle_id: "com.apple.Health".to_string(),
        name: "Health".to_string(),
        version: None,
    }
}

/// Source mimicking a CGM app.
pub fn cgm_source() -> SampleSource {
    SampleSource {
        bundle_id: "com.dexcom.G7".to_string(),
        name: "Dexcom G7".to_string(),
        version: Some("2.4".to_string()),
    }
}

fn bare_sample(start: DateTime<Utc>, end: DateTime<Utc>, value: f64) -> HealthSample {
    HealthSample {
        id: Uuid::new_v4(),
        start,
        end,
        value,
        source: default_source(),
        metadata: Map::new(),
        workout: None,
    }
}

/// Instantaneous glucose reading in mg/dL.
pub fn glucose_sample(start: DateTime<Utc>, mg_dl: f64) -> HealthSample {
    bare_sample(start, start, mg_dl)
}

/// Glucose reading flagged as manually entered by the user.
pub fn fingerstick_sample(start: DateTime<Utc>, mg_dl: f64) -> HealthSample {
    let mut sample = glucose_sample(start, mg_dl);
    sample
        .metadata
        .insert(METADATA_WAS_USER_ENTERED.to_string(), json!(true));
    sample
}

/// CGM glucose reading from the Dexcom source.
pub fn cgm_sample(start: DateTime<Utc>, mg_dl: f64) -> HealthSample {
    let mut sample = glucose_sample(start, mg_dl);
    sample.source = cgm_source();
    sample
}

/// Insulin dose over `[start, end]`; `reason` is the store's delivery-reason
/// code (1 basal, 2 bolus).
pub fn insulin_sample(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    units: f64,
    reason: i64,
) -> HealthSample {
    let mut sample = bare_sample(start, end, units);
    sample
        .metadata
        .insert(METADATA_INSULIN_DELIVERY_REASON.to_string(), json!(reason));
    sample
}

/// Temp-basal dose carrying the suppressed scheduled rate.
pub fn temp_basal_sample(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    units: f64,
    scheduled_rate: f64,
) -> HealthSample {
    let mut sample = insulin_sample(start, end, units, 1);
    sample.metadata.insert(
        METADATA_SCHEDULED_BASAL_RATE.to_string(),
        json!(scheduled_rate),
    );
    sample
}

/// Carbohydrate entry in grams.
pub fn carb_sample(start: DateTime<Utc>, grams: f64) -> HealthSample {
    bare_sample(start, start, grams)
}

/// Carbohydrate entry with a food name.
pub fn food_sample(start: DateTime<Utc>, grams: f64, food: &str) -> HealthSample {
    let mut sample = carb_sample(start, grams);
    sample
        .metadata
        .insert(METADATA_FOOD_TYPE.to_string(), json!(food));
    sample
}

/// Workout session with duration in seconds.
pub fn workout_sample(start: DateTime<Utc>, duration_secs: f64, activity: &str) -> HealthSample {
    let mut sample = bare_sample(start, start + Duration::seconds(duration_secs as i64), 0.0);
    sample.workout = Some(WorkoutDetail {
        activity: activity.to_string(),
        duration_secs,
        distance_miles: Some(3.1),
        energy_kcal: Some(280.0),
    });
    sample
}

/// Attach one metadata entry, returning the sample for chaining.
pub fn with_meta(mut sample: HealthSample, key: &str, value: Value) -> HealthSample {
    sample.metadata.insert(key.to_string(), value);
    sample
}

/// Deletion marker for an existing sample.
pub fn deletion_of(sample: &HealthSample) -> DeletedSample {
    DeletedSample { id: sample.id }
}

/// Deletion marker for a sample the store no longer has.
pub fn deletion() -> DeletedSample {
    DeletedSample { id: Uuid::new_v4() }
}
