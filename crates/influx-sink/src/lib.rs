use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use types::{Measurement, MeasurementBatch, MeasurementValue};

/// Destination for decoded batches. Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait MeasurementSink: Send + Sync {
    async fn write_batch(&self, batch: &MeasurementBatch) -> Result<(), SinkError>;
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("influxdb client init failed: {0}")]
    Build(reqwest::Error),
    #[error("influxdb request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("influxdb rejected write with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://10.100.59.108:8086`.
    pub url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_ms: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            database: "COMPRESSORS".to_string(),
            username: None,
            password: None,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone)]
struct HttpTarget {
    client: Client,
    write_url: String,
    username: Option<String>,
    password: Option<String>,
}

/// InfluxDB writer. Without an HTTP target it only logs what it would write.
#[derive(Debug, Clone)]
pub struct InfluxWriter {
    target: Option<HttpTarget>,
}

impl InfluxWriter {
    pub fn new_mock() -> Self {
        Self { target: None }
    }

    pub fn new_http(config: InfluxConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(SinkError::Build)?;
        let write_url = format!(
            "{}/write?db={}&precision=s",
            config.url.trim_end_matches('/'),
            config.database
        );

        Ok(Self {
            target: Some(HttpTarget {
                client,
                write_url,
                username: config.username,
                password: config.password,
            }),
        })
    }

    pub fn is_mock(&self) -> bool {
        self.target.is_none()
    }
}

#[async_trait]
impl MeasurementSink for InfluxWriter {
    async fn write_batch(&self, batch: &MeasurementBatch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        let Some(target) = &self.target else {
            let records = serde_json::to_string(&batch.records())?;
            info!(device = %batch.device_tag, records = batch.len(), "mock write invoked");
            debug!(device = %batch.device_tag, %records, "mock write payload");
            return Ok(());
        };

        let body = to_line_protocol(batch);
        let skipped = batch.missing_count();
        if body.is_empty() {
            debug!(device = %batch.device_tag, skipped, "no reported values to write");
            return Ok(());
        }

        let mut request = target.client.post(&target.write_url).body(body);
        if let Some(username) = &target.username {
            request = request.basic_auth(username, target.password.as_deref());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            device = %batch.device_tag,
            written = batch.len() - skipped,
            skipped,
            "batch written to influxdb"
        );
        Ok(())
    }
}

/// Renders a batch as InfluxDB line protocol, one line per reported value.
/// Missing values have no line-protocol form and are left out.
pub fn to_line_protocol(batch: &MeasurementBatch) -> String {
    batch
        .measurements
        .iter()
        .filter_map(line_for)
        .collect::<Vec<_>>()
        .join("\n")
}

fn line_for(measurement: &Measurement) -> Option<String> {
    let value = match measurement.value {
        MeasurementValue::Integer(v) => format!("{v}i"),
        MeasurementValue::Float(v) => format!("{v:?}"),
        MeasurementValue::Missing => return None,
    };

    let mut line = escape_measurement(&measurement.key);
    for (key, tag) in [
        ("eu", measurement.unit.as_str()),
        ("location", measurement.location.as_str()),
        ("type", measurement.category.code()),
    ] {
        if tag.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(key);
        line.push('=');
        line.push_str(&escape_tag(tag));
    }

    line.push_str(" value=");
    line.push_str(&value);
    line.push(' ');
    line.push_str(&measurement.captured_at.timestamp().to_string());
    Some(line)
}

fn escape_measurement(value: &str) -> String {
    value.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_tag(value: &str) -> String {
    value
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}
