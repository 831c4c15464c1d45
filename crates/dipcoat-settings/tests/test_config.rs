use dipcoat_settings::{Config, SettingsError};
use tempfile::tempdir;

#[test]
fn test_toml_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::new();
    config.connection.port = "/dev/ttyUSB0".to_string();
    config.connection.baud_rate = 115200;
    config.commands.home_timeout_ms = 60000;
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::new();
    config.connection.auto_reconnect = false;
    config.events.channel_capacity = 64;
    config.save_to_file(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"auto_reconnect\": false"));
    assert_eq!(Config::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_unsupported_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "connection: {}").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::UnsupportedFormat(ref ext) if ext == "yaml"));

    let err = Config::new().save_to_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::UnsupportedFormat(_)));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connection]\nbaud_rate = 0\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::InvalidSetting { ref key, .. } if key == "connection.baud_rate"));
}

#[test]
fn test_malformed_files() {
    let dir = tempdir().unwrap();

    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[connection\nport = ").unwrap();
    assert!(matches!(
        Config::load_from_file(&path).unwrap_err(),
        SettingsError::TomlError(_)
    ));

    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ \"connection\": ").unwrap();
    assert!(matches!(
        Config::load_from_file(&path).unwrap_err(),
        SettingsError::JsonError(_)
    ));
}

#[test]
fn test_load_or_default_with_explicit_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[commands]\nstatus_timeout_ms = 500\n").unwrap();

    let config = Config::load_or_default(Some(&path)).unwrap();
    assert_eq!(config.commands.status_timeout_ms, 500);
    assert_eq!(config.commands.response_timeout_ms, 5000);

    let missing = dir.path().join("missing.toml");
    assert!(matches!(
        Config::load_or_default(Some(&missing)).unwrap_err(),
        SettingsError::IoError(_)
    ));
}
