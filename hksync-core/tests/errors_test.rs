use hksync_core::errors::*;

#[test]
fn settings_error_carries_scope_and_field() {
    let err = SettingsError::MalformedValue {
        scope: "Current-BloodGlucose".into(),
        field: "queryAnchor".into(),
        raw: "###".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("Current-BloodGlucose"));
    assert!(msg.contains("queryAnchor"));
}

#[test]
fn store_error_carries_type_name() {
    let err = StoreError::QueryFailed {
        type_name: "BloodGlucose".into(),
        message: "store unavailable".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("BloodGlucose"));
    assert!(msg.contains("store unavailable"));
}

#[test]
fn upload_error_http_status_carries_status_and_body() {
    let err = UploadError::HttpStatus {
        status: 503,
        body_snippet: "maintenance".into(),
    };
    let msg = err.to_string();
    assert!(msg.contains("503"));
    assert!(msg.contains("maintenance"));
}

#[test]
fn upload_error_token_expired_names_401() {
    assert!(UploadError::TokenExpired.to_string().contains("401"));
}

// --- From impls ---

#[test]
fn settings_error_converts_to_sync_error() {
    let err = SettingsError::SqliteError {
        message: "disk full".into(),
    };
    let sync_err: SyncError = err.into();
    assert!(matches!(sync_err, SyncError::SettingsError(_)));
}

#[test]
fn store_error_converts_to_sync_error() {
    let err = StoreError::AuthorizationDenied {
        type_name: "Workout".into(),
    };
    let sync_err: SyncError = err.into();
    assert!(matches!(sync_err, SyncError::StoreError(_)));
}

#[test]
fn upload_error_converts_to_sync_error() {
    let err = UploadError::Cancelled;
    let sync_err: SyncError = err.into();
    assert!(matches!(sync_err, SyncError::UploadError(_)));
}

#[test]
fn engine_error_converts_to_sync_error() {
    let err = EngineError::MissingUploadSession;
    let sync_err: SyncError = err.into();
    assert!(matches!(sync_err, SyncError::EngineError(_)));
}

#[test]
fn serde_error_converts_to_sync_error() {
    let json_err = serde_json::from_str::<String>("not valid json").unwrap_err();
    let sync_err: SyncError = json_err.into();
    assert!(matches!(sync_err, SyncError::SerializationError(_)));
}
