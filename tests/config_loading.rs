// tests/config_loading.rs
//! Configuration files on disk: default creation, JSON and TOML loading

use iot_sim::config::{ConfigFormat, ConfigLoader, SimulatorConfig};
use iot_sim::simulation::WaveformKind;
use iot_sim::SimError;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_missing_file_creates_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let loader = ConfigLoader::new(&path);

    assert!(loader.ensure_exists().unwrap());
    assert!(path.exists());
    assert!(!loader.ensure_exists().unwrap());

    let config = loader.load().unwrap();
    assert_eq!(config, SimulatorConfig::default());

    let device = &config.devices["device1"];
    let kinds: Vec<WaveformKind> = device
        .values()
        .map(|spec| spec.parsed_kind().unwrap())
        .collect();
    for kind in WaveformKind::ALL {
        assert!(kinds.contains(&kind), "default config lacks {}", kind);
    }
}

#[test]
fn test_load_creates_file_when_missing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.json");

    let config = ConfigLoader::new(&path).load().unwrap();

    assert!(path.exists());
    assert!(config.validate().is_ok());
}

#[test]
fn test_default_written_as_type_keyed_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    ConfigLoader::new(&path).ensure_exists().unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["devices"]["device1"]["Temperature1"]["type"], "linear");
    assert_eq!(raw["devices"]["device1"]["Sin1"]["type"], "sin");
    assert_eq!(raw["mqtt"]["port"], 1883);
    assert_eq!(raw["publish_interval"], 2.0);
}

#[test]
fn test_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.json");
    let loader = ConfigLoader::new(&path);

    let mut config = SimulatorConfig::default();
    config.publish_interval = 0.5;
    config.mqtt.uri = "broker.internal".to_string();
    config.mqtt.username = "sim".to_string();
    config.mqtt.password = "secret".to_string();

    loader.save(&config).unwrap();
    assert_eq!(loader.load().unwrap(), config);
}

#[test]
fn test_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sim.toml");
    fs::write(
        &path,
        r#"
publish_interval = 1.5
verbose = true

[mqtt]
uri = "localhost"
port = 1884
topic_prefix = "plant"

[devices.boiler.Temperature]
type = "linear"
start = 80
slope = 0.5

[devices.boiler.Vibration]
kind = "noise"
mean = 0
stddev = 0.2
"#,
    )
    .unwrap();

    let loader = ConfigLoader::new(&path);
    assert_eq!(loader.format(), ConfigFormat::Toml);

    let config = loader.load().unwrap();
    assert_eq!(config.publish_interval, 1.5);
    assert!(config.verbose);
    assert_eq!(config.mqtt.port, 1884);
    assert_eq!(config.mqtt.topic_prefix, "plant");
    assert_eq!(config.devices["boiler"].len(), 2);
    assert_eq!(config.devices["boiler"]["Vibration"].kind, "noise");
}

#[test]
fn test_toml_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("default.toml");
    let loader = ConfigLoader::new(&path);

    assert!(loader.ensure_exists().unwrap());
    assert_eq!(loader.load().unwrap(), SimulatorConfig::default());
}

#[test]
fn test_invalid_fields_are_config_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(
        &path,
        r#"{"publish_interval": 0, "devices": {"d": {"p": {"type": "linear"}}}}"#,
    )
    .unwrap();

    let err = ConfigLoader::new(&path).load().unwrap_err();
    assert!(matches!(err, SimError::Config { ref field, .. } if field == "publish_interval"));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ devices: ").unwrap();

    let err = ConfigLoader::new(&path).load().unwrap_err();
    assert!(matches!(err, SimError::Parse { .. }));
    assert!(err.to_string().contains("broken.json"));
}

#[test]
fn test_unknown_kind_survives_loading() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kinds.json");
    fs::write(
        &path,
        r#"{"devices": {"d": {"p": {"type": "bogus", "amplitude": 2}}}}"#,
    )
    .unwrap();

    let config = ConfigLoader::new(&path).load().unwrap();
    let spec = &config.devices["d"]["p"];
    assert!(matches!(spec.parsed_kind(), Err(SimError::UnsupportedWaveform { .. })));
}
