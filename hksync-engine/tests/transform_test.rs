//! Wire-record preparation tests: one section per sample kind, plus the
//! shared envelope and deletion markers.

use proptest::prelude::*;
use serde_json::{json, Value};

use hksync_core::constants::METADATA_RECEIVER_DISPLAY_TIME;
use hksync_core::types::SampleKind;
use hksync_engine::transform::SampleTransform;
use test_fixtures::{
    carb_sample, cgm_sample, deletion_of, fingerstick_sample, food_sample, glucose_sample,
    insulin_sample, temp_basal_sample, ts, with_meta, workout_sample,
};

fn prepare_one(kind: SampleKind, sample: &hksync_core::types::HealthSample) -> Value {
    let mut records = kind.prepare_data_for_upload(std::slice::from_ref(sample));
    assert_eq!(records.len(), 1, "expected exactly one record");
    records.remove(0)
}

// ═══════════════════════════════════════════════════════════════════════════
// ENVELOPE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn records_carry_wire_time_and_origin() {
    let sample = glucose_sample(ts(0), 120.0);
    let record = prepare_one(SampleKind::BloodGlucose, &sample);

    assert_eq!(record["time"], json!("2021-06-01T00:00:00.000Z"));
    assert_eq!(record["origin"]["id"], json!(sample.id.to_string()));
    assert_eq!(record["origin"]["name"], json!("com.apple.HealthKit"));
    assert_eq!(record["origin"]["type"], json!("service"));
    assert_eq!(
        record["origin"]["payload"]["sourceRevision"]["source"]["bundleIdentifier"],
        json!("com.apple.Health")
    );
}

#[test]
fn source_version_lands_in_source_revision() {
    let sample = cgm_sample(ts(0), 120.0);
    let record = prepare_one(SampleKind::BloodGlucose, &sample);
    assert_eq!(
        record["origin"]["payload"]["sourceRevision"]["version"],
        json!("2.4")
    );
}

#[test]
fn delete_markers_carry_origin_id_only() {
    let sample = glucose_sample(ts(0), 100.0);
    let markers = SampleKind::BloodGlucose.prepare_data_for_delete(&[deletion_of(&sample)]);
    assert_eq!(
        markers,
        vec![json!({ "origin": { "id": sample.id.to_string() } })]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// BLOOD GLUCOSE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn health_app_reading_is_smbg() {
    let record = prepare_one(SampleKind::BloodGlucose, &glucose_sample(ts(0), 110.0));
    assert_eq!(record["type"], json!("smbg"));
    assert_eq!(record["units"], json!("mg/dL"));
    assert_eq!(record["value"], json!(110.0));
    assert!(record.get("subType").is_none());
}

#[test]
fn cgm_reading_is_cbg() {
    let record = prepare_one(SampleKind::BloodGlucose, &cgm_sample(ts(0), 135.0));
    assert_eq!(record["type"], json!("cbg"));
}

#[test]
fn user_entered_reading_is_manual_smbg() {
    let sample = fingerstick_sample(ts(0), 98.0);
    let record = prepare_one(SampleKind::BloodGlucose, &sample);
    assert_eq!(record["type"], json!("smbg"));
    assert_eq!(record["subType"], json!("manual"));
    // the flag itself rides along in the payload
    assert_eq!(record["payload"]["HKWasUserEntered"], json!(true));
}

#[test]
fn dexcom_low_reading_is_annotated_and_clamped() {
    let record = prepare_one(SampleKind::BloodGlucose, &cgm_sample(ts(0), 20.0));
    assert_eq!(record["value"], json!(39.0));
    assert_eq!(
        record["annotations"],
        json!([{ "code": "bg/out-of-range", "value": "low", "threshold": 40 }])
    );
}

#[test]
fn dexcom_high_reading_is_annotated_and_clamped() {
    let record = prepare_one(SampleKind::BloodGlucose, &cgm_sample(ts(0), 500.0));
    assert_eq!(record["value"], json!(401.0));
    assert_eq!(
        record["annotations"],
        json!([{ "code": "bg/out-of-range", "value": "high", "threshold": 400 }])
    );
}

#[test]
fn non_dexcom_reading_is_never_annotated() {
    let record = prepare_one(SampleKind::BloodGlucose, &glucose_sample(ts(0), 25.0));
    assert_eq!(record["value"], json!(25.0));
    assert!(record.get("annotations").is_none());
}

#[test]
fn glucose_outside_plausible_bounds_is_dropped() {
    let records = SampleKind::BloodGlucose.prepare_data_for_upload(&[
        glucose_sample(ts(0), -5.0),
        glucose_sample(ts(1), 2000.0),
        glucose_sample(ts(2), f64::NAN),
    ]);
    assert!(records.is_empty());
}

#[test]
fn receiver_display_time_becomes_device_time() {
    let sample = with_meta(
        cgm_sample(ts(0), 140.0),
        METADATA_RECEIVER_DISPLAY_TIME,
        json!("2021-06-01T08:30:00Z"),
    );
    let record = prepare_one(SampleKind::BloodGlucose, &sample);
    assert_eq!(record["deviceTime"], json!("2021-06-01T08:30:00"));
    // consumed: nothing left for the payload
    assert!(record.get("payload").is_none());
}

proptest! {
    #[test]
    fn prepared_cgm_value_stays_in_service_bounds(mg_dl in 0.0f64..=1000.0) {
        let record = prepare_one(SampleKind::BloodGlucose, &cgm_sample(ts(0), mg_dl));
        let value = record["value"].as_f64().unwrap();
        prop_assert!((39.0..=401.0).contains(&value));
    }

    #[test]
    fn non_cgm_glucose_value_passes_through(mg_dl in 0.0f64..=1000.0) {
        let record = prepare_one(SampleKind::BloodGlucose, &glucose_sample(ts(0), mg_dl));
        prop_assert_eq!(record["value"].as_f64().unwrap(), mg_dl);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// INSULIN
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn bolus_record_shape() {
    let sample = insulin_sample(ts(0), ts(0), 5.5, 2);
    let record = prepare_one(SampleKind::Insulin, &sample);
    assert_eq!(record["type"], json!("bolus"));
    assert_eq!(record["subType"], json!("normal"));
    assert_eq!(record["normal"], json!(5.5));
}

#[test]
fn temp_basal_derives_rate_from_duration() {
    // 0.5 units over 30 minutes is 1.0 units/hour
    let sample = temp_basal_sample(ts(0), ts(1800), 0.5, 0.85);
    let record = prepare_one(SampleKind::Insulin, &sample);
    assert_eq!(record["type"], json!("basal"));
    assert_eq!(record["deliveryType"], json!("temp"));
    assert_eq!(record["duration"], json!(1_800_000));
    assert_eq!(record["rate"], json!(1.0));
    assert_eq!(
        record["suppressed"],
        json!({ "type": "basal", "deliveryType": "scheduled", "rate": 0.85 })
    );
}

#[test]
fn basal_without_scheduled_rate_has_no_suppressed_block() {
    let sample = insulin_sample(ts(0), ts(3600), 1.2, 1);
    let record = prepare_one(SampleKind::Insulin, &sample);
    assert_eq!(record["rate"], json!(1.2));
    assert!(record.get("suppressed").is_none());
}

#[test]
fn insulin_without_delivery_reason_is_dropped() {
    let mut sample = insulin_sample(ts(0), ts(0), 3.0, 2);
    sample.metadata.clear();
    assert!(SampleKind::Insulin.prepare_data_for_upload(&[sample]).is_empty());
}

#[test]
fn zero_duration_basal_is_dropped() {
    let sample = insulin_sample(ts(0), ts(0), 1.0, 1);
    assert!(SampleKind::Insulin.prepare_data_for_upload(&[sample]).is_empty());
}

#[test]
fn implausible_bolus_is_dropped() {
    let sample = insulin_sample(ts(0), ts(0), 150.0, 2);
    assert!(SampleKind::Insulin.prepare_data_for_upload(&[sample]).is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// CARBS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn carb_record_carries_net_grams() {
    let record = prepare_one(SampleKind::Carb, &carb_sample(ts(0), 45.0));
    assert_eq!(record["type"], json!("food"));
    assert_eq!(
        record["nutrition"],
        json!({ "carbohydrate": { "net": 45.0, "units": "grams" } })
    );
    assert!(record.get("name").is_none());
}

#[test]
fn food_name_is_truncated_to_100_chars() {
    let long = "x".repeat(150);
    let record = prepare_one(SampleKind::Carb, &food_sample(ts(0), 30.0, &long));
    assert_eq!(record["name"].as_str().unwrap().chars().count(), 100);
    // food type is consumed; nothing else to carry
    assert!(record.get("payload").is_none());
}

#[test]
fn implausible_grams_upload_without_nutrition() {
    let record = prepare_one(SampleKind::Carb, &carb_sample(ts(0), 5000.0));
    assert_eq!(record["type"], json!("food"));
    assert!(record.get("nutrition").is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// WORKOUTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn workout_record_fields_and_display_name() {
    let record = prepare_one(SampleKind::Workout, &workout_sample(ts(0), 3600.0, "Running"));
    assert_eq!(record["type"], json!("physicalActivity"));
    assert_eq!(record["duration"], json!({ "units": "seconds", "value": 3600.0 }));
    assert_eq!(record["distance"], json!({ "units": "miles", "value": 3.1 }));
    assert_eq!(record["energy"], json!({ "units": "kilocalories", "value": 280.0 }));
    assert_eq!(record["name"], json!("Running - 3.10 miles"));
}

#[test]
fn workout_without_detail_is_dropped() {
    // a sample that never carried workout detail
    let sample = glucose_sample(ts(0), 0.0);
    assert!(SampleKind::Workout.prepare_data_for_upload(&[sample]).is_empty());
}

#[test]
fn implausible_distance_skips_field_and_name_suffix() {
    let mut sample = workout_sample(ts(0), 1800.0, "Cycling");
    sample.workout.as_mut().unwrap().distance_miles = Some(500.0);
    let record = prepare_one(SampleKind::Workout, &sample);
    assert!(record.get("distance").is_none());
    assert_eq!(record["name"], json!("Cycling"));
}

#[test]
fn implausible_duration_skips_field_but_keeps_record() {
    let mut sample = workout_sample(ts(0), 60.0, "Yoga");
    sample.workout.as_mut().unwrap().duration_secs = f64::INFINITY;
    let record = prepare_one(SampleKind::Workout, &sample);
    assert!(record.get("duration").is_none());
    assert_eq!(record["type"], json!("physicalActivity"));
}
