use super::*;

#[test]
fn default_config_round_trips_through_toml() {
    let config = Config::default();
    let toml_str = config.to_toml();
    let parsed: Result<FileConfig, _> = toml::from_str(&toml_str);
    assert!(parsed.is_ok(), "default config should round-trip: {:?}", parsed.err());
}

#[test]
fn file_logging_defaults_fill_missing_fields() {
    let logging = LoggingConfig::from_file(Some(FileLogging {
        level: Some("debug".to_string()),
        ..Default::default()
    }));
    assert_eq!(logging.level, "debug");
    assert!(!logging.file_enabled);
}

#[test]
fn log_rotation_parses_known_values_and_falls_back_to_daily() {
    assert_eq!(LogRotation::from_str("hourly"), LogRotation::Hourly);
    assert_eq!(LogRotation::from_str("never"), LogRotation::Never);
    assert_eq!(LogRotation::from_str("bogus"), LogRotation::Daily);
}
