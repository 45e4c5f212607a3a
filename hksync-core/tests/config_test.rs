use hksync_core::config::*;

#[test]
fn config_loads_from_empty_toml_with_all_defaults() {
    let config = UploaderConfig::from_toml_str("").unwrap();

    assert_eq!(config.service_url, "https://api.hksync.org");
    assert_eq!(config.request_timeout_secs, 60);
    assert_eq!(config.current_lookback_days, 7);
    assert_eq!(config.session_id_prefix, "org.hksync.upload");
}

#[test]
fn config_partial_toml_overrides_only_named_fields() {
    let raw = r#"
        service_url = "https://staging.hksync.org"
        request_timeout_secs = 15
    "#;
    let config = UploaderConfig::from_toml_str(raw).unwrap();

    assert_eq!(config.service_url, "https://staging.hksync.org");
    assert_eq!(config.request_timeout_secs, 15);
    assert_eq!(config.current_lookback_days, 7);
    assert_eq!(config.session_id_prefix, "org.hksync.upload");
}

#[test]
fn config_roundtrips_through_toml() {
    let mut config = UploaderConfig::default();
    config.current_lookback_days = 30;

    let rendered = config.to_toml_string().unwrap();
    let parsed = UploaderConfig::from_toml_str(&rendered).unwrap();
    assert_eq!(parsed.current_lookback_days, 30);
    assert_eq!(parsed.service_url, config.service_url);
}

#[test]
fn config_rejects_malformed_toml() {
    assert!(UploaderConfig::from_toml_str("service_url = [").is_err());
}
