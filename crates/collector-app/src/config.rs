use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use device_poller::PollerConfig;
use influx_sink::InfluxConfig;
use mkv_client::ClientConfig;
use register_decoder::FamilyLayout;
use types::{DeviceDescriptor, DeviceFamily};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOCATION: &str = "Compressor Room";

#[derive(Clone, Debug)]
pub struct CollectorConfig {
    pub devices: Vec<DeviceDescriptor>,
    pub client: ClientConfig,
    pub poller: PollerConfig,
    /// Unset means batches are only logged.
    pub influx: Option<InfluxConfig>,
    pub log_level: String,
    pub log_file: Option<String>,
}

impl CollectorConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config);
        }

        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client.timeout_ms == 0 {
            anyhow::bail!("client.timeout_ms must be >= 1");
        }
        if !self.client.endpoint_path.starts_with('/') {
            anyhow::bail!("client.endpoint_path must start with '/'");
        }
        if self.poller.max_concurrency == 0 {
            anyhow::bail!("poller.max_concurrency must be >= 1");
        }

        let mut tags = HashSet::new();
        for device in &self.devices {
            if device.address.trim().is_empty() {
                anyhow::bail!("device {:?} has an empty address", device.tag);
            }
            if device.tag.trim().is_empty() {
                anyhow::bail!("device at {} has an empty tag", device.address);
            }
            if !tags.insert(device.tag.as_str()) {
                anyhow::bail!("device tag {} is configured more than once", device.tag);
            }
        }

        if let Some(ref influx) = self.influx {
            if influx.url.trim().is_empty() {
                anyhow::bail!("influx.url must be non-empty when set");
            }
            if !influx.url.starts_with("http://") && !influx.url.starts_with("https://") {
                anyhow::bail!("influx.url must be an http(s) URL");
            }
            validate_database_name(&influx.database)?;
            if influx.timeout_ms == 0 {
                anyhow::bail!("influx.timeout_ms must be >= 1");
            }
            if influx.password.is_some() && influx.username.is_none() {
                anyhow::bail!("influx.password requires influx.username");
            }
        }

        if self.log_level.trim().is_empty() {
            anyhow::bail!("logging.level must be non-empty");
        }

        for family in [DeviceFamily::Legacy, DeviceFamily::Current] {
            FamilyLayout::for_family(family)
                .validate()
                .with_context(|| format!("{family} register layout is inconsistent"))?;
        }

        Ok(())
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            client: ClientConfig::default(),
            poller: PollerConfig::default(),
            influx: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
        }
    }
}

fn apply_env_overrides(config: &mut CollectorConfig) -> Result<()> {
    if let Some(timeout_ms) = parse_env_u64("COMPRESSOR_TIMEOUT_MS") {
        config.client.timeout_ms = timeout_ms;
    }

    if let Some(max) = parse_env_usize("COMPRESSOR_MAX_CONCURRENCY") {
        config.poller.max_concurrency = max;
    }

    if let Ok(value) = env::var("COMPRESSOR_DEVICES") {
        config.devices = parse_device_list(&value)?;
    }

    if let Ok(url) = env::var("COMPRESSOR_INFLUX_URL") {
        config.influx.get_or_insert_with(InfluxConfig::default).url = url;
    }

    if let Some(influx) = config.influx.as_mut() {
        if let Ok(database) = env::var("COMPRESSOR_INFLUX_DATABASE") {
            influx.database = database;
        }
        influx.username = env::var("COMPRESSOR_INFLUX_USERNAME")
            .ok()
            .or(influx.username.take());
        influx.password = env::var("COMPRESSOR_INFLUX_PASSWORD")
            .ok()
            .or(influx.password.take());
    }

    if let Ok(value) = env::var("COMPRESSOR_LOG_LEVEL") {
        config.log_level = value;
    }
    config.log_file = env::var("COMPRESSOR_LOG_FILE").ok().or(config.log_file.take());

    Ok(())
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    client: Option<FileClientConfig>,
    poller: Option<FilePollerConfig>,
    influx: Option<FileInfluxConfig>,
    logging: Option<FileLoggingConfig>,
    devices: Option<Vec<FileDeviceConfig>>,
}

#[derive(Debug, Deserialize)]
struct FileClientConfig {
    timeout_ms: Option<u64>,
    endpoint_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilePollerConfig {
    max_concurrency: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FileInfluxConfig {
    url: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileLoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileDeviceConfig {
    address: String,
    tag: String,
    location: Option<String>,
    family: DeviceFamily,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("COMPRESSOR_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content =
        fs::read_to_string(&path).with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut CollectorConfig, file: FileConfig) {
    if let Some(client) = file.client {
        if let Some(timeout_ms) = client.timeout_ms {
            config.client.timeout_ms = timeout_ms;
        }
        if let Some(endpoint_path) = client.endpoint_path {
            config.client.endpoint_path = endpoint_path;
        }
    }

    if let Some(poller) = file.poller {
        if let Some(max) = poller.max_concurrency {
            config.poller.max_concurrency = max;
        }
    }

    if let Some(influx) = file.influx {
        if let Some(url) = influx.url {
            let mut influx_config = InfluxConfig {
                url,
                ..InfluxConfig::default()
            };
            if let Some(database) = influx.database {
                influx_config.database = database;
            }
            if let Some(timeout_ms) = influx.timeout_ms {
                influx_config.timeout_ms = timeout_ms;
            }
            influx_config.username = influx.username;
            influx_config.password = influx.password;
            config.influx = Some(influx_config);
        }
    }

    if let Some(logging) = file.logging {
        if let Some(level) = logging.level {
            config.log_level = level;
        }
        if let Some(file) = logging.file {
            config.log_file = Some(file);
        }
    }

    if let Some(devices) = file.devices {
        config.devices = devices
            .into_iter()
            .map(|device| DeviceDescriptor {
                address: device.address,
                tag: device.tag,
                location: device
                    .location
                    .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
                family: device.family,
            })
            .collect();
    }
}

fn parse_env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

/// Parses `address|tag|location|family` entries separated by commas.
/// Location may be left empty to use the default.
pub fn parse_device_list(value: &str) -> Result<Vec<DeviceDescriptor>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
            let [address, tag, location, family] = parts.as_slice() else {
                anyhow::bail!("device entry {entry:?} must be address|tag|location|family");
            };
            let family = family
                .parse::<DeviceFamily>()
                .map_err(|err| anyhow::anyhow!(err))
                .with_context(|| format!("device entry {entry:?}"))?;
            Ok(DeviceDescriptor {
                address: address.to_string(),
                tag: tag.to_string(),
                location: if location.is_empty() {
                    DEFAULT_LOCATION.to_string()
                } else {
                    location.to_string()
                },
                family,
            })
        })
        .collect()
}

fn validate_database_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("influx.database must be non-empty");
    }
    if name
        .chars()
        .any(|ch| !ch.is_ascii_alphanumeric() && ch != '_' && ch != '-')
    {
        anyhow::bail!("influx.database contains invalid characters");
    }
    Ok(())
}
