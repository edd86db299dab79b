use std::env;
use std::path::PathBuf;
use std::sync::Mutex;

use collector_app::{parse_device_list, CollectorConfig};
use types::DeviceFamily;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_KEYS: &[&str] = &[
    "COMPRESSOR_CONFIG",
    "COMPRESSOR_TIMEOUT_MS",
    "COMPRESSOR_MAX_CONCURRENCY",
    "COMPRESSOR_DEVICES",
    "COMPRESSOR_INFLUX_URL",
    "COMPRESSOR_INFLUX_DATABASE",
    "COMPRESSOR_INFLUX_USERNAME",
    "COMPRESSOR_INFLUX_PASSWORD",
    "COMPRESSOR_LOG_LEVEL",
    "COMPRESSOR_LOG_FILE",
];

fn clear_env() {
    for key in ENV_KEYS {
        env::remove_var(key);
    }
}

#[test]
fn toml_config_validates() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("COMPRESSOR_CONFIG", fixture_path("config-valid.toml"));

    let config = CollectorConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.devices.len(), 2);
    assert_eq!(config.devices[1].family, DeviceFamily::Current);
    assert_eq!(config.devices[1].location, "Compressor Room");
    assert_eq!(config.poller.max_concurrency, 2);
    assert_eq!(config.log_level, "debug");
    let influx = config.influx.expect("influx config");
    assert_eq!(influx.database, "COMPRESSORS");

    clear_env();
}

#[test]
fn json_config_validates() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("COMPRESSOR_CONFIG", fixture_path("config-valid.json"));

    let config = CollectorConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.client.timeout_ms, 1_500);
    assert_eq!(config.devices[1].family, DeviceFamily::Current);
    assert!(config.influx.is_none());

    clear_env();
}

#[test]
fn invalid_config_fails_validation() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("COMPRESSOR_CONFIG", fixture_path("config-invalid.toml"));

    let mut config = CollectorConfig::load().expect("load config");
    assert!(config.validate().is_err());

    // Duplicate tags would merge two compressors into one series.
    config.client.timeout_ms = 2_000;
    let err = config.validate().expect_err("duplicate tags");
    assert!(err.to_string().contains("080BL515"));

    clear_env();
}

#[test]
fn env_overrides_file_values() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|err| err.into_inner());
    clear_env();
    env::set_var("COMPRESSOR_CONFIG", fixture_path("config-valid.toml"));
    env::set_var("COMPRESSOR_TIMEOUT_MS", "750");
    env::set_var("COMPRESSOR_DEVICES", "10.0.0.5|T5||current");
    env::set_var("COMPRESSOR_INFLUX_DATABASE", "TEST_DB");

    let config = CollectorConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.client.timeout_ms, 750);
    assert_eq!(config.devices.len(), 1);
    assert_eq!(config.devices[0].tag, "T5");
    assert_eq!(config.influx.expect("influx").database, "TEST_DB");

    clear_env();
}

#[test]
fn device_list_rejects_malformed_entries() {
    let devices = parse_device_list("10.0.0.1|A|Room 1|legacy, 10.0.0.2|B|Room 2|2")
        .expect("device list");
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].family, DeviceFamily::Current);

    assert!(parse_device_list("10.0.0.1|A|legacy").is_err());
    assert!(parse_device_list("10.0.0.1|A|Room|turbo").is_err());
}

fn fixture_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path.to_string_lossy().to_string()
}
