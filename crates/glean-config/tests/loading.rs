use std::io::Write;
use std::path::Path;

use glean_config::{load_settings, ConfigError};

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yml")
        .tempfile()
        .expect("tempfile");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_when_no_file() {
    let settings = load_settings(None).expect("defaults should validate");
    assert_eq!(settings.matching.max_radius_miles, 50.0);
    assert_eq!(settings.matching.top_recommendations, 5);
    assert_eq!(settings.compliance.min_expiration_buffer_hours, 24);
    assert_eq!(settings.audit.retention_days, 730);
    assert!((settings.matching.weights.sum() - 1.0).abs() < 1e-9);
}

#[test]
fn partial_file_overrides_only_named_fields() {
    let file = write_config(
        "matching:\n  max_radius_miles: 25\ncompliance:\n  blocked_keywords: [\"Spoiled\", \"LEAKING\"]\n",
    );
    let settings = load_settings(Some(file.path())).expect("should load");
    assert_eq!(settings.matching.max_radius_miles, 25.0);
    // Untouched sections keep their defaults.
    assert_eq!(settings.matching.top_recommendations, 5);
    assert_eq!(settings.providers.enrich_timeout_secs, 30);
    // Keywords are normalized to lowercase at load time.
    assert_eq!(settings.compliance.blocked_keywords, vec!["spoiled", "leaking"]);
}

#[test]
fn bad_weights_rejected() {
    let file = write_config(
        "matching:\n  weights:\n    distance: 0.9\n    time: 0.9\n    category: 0.1\n    capacity: 0.1\n    reliability: 0.1\n",
    );
    let err = load_settings(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn unknown_keys_rejected() {
    let file = write_config("matcing:\n  max_radius_miles: 25\n");
    assert!(matches!(
        load_settings(Some(file.path())),
        Err(ConfigError::YamlParse { .. })
    ));
}

#[test]
fn missing_file_returns_io_error() {
    let path = Path::new("/nonexistent/glean/settings.yml");
    assert!(matches!(
        load_settings(Some(path)),
        Err(ConfigError::Io { .. })
    ));
}
