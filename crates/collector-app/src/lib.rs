mod config;
mod logging;

use anyhow::{Context, Result};
use tracing::{info, warn};

use device_poller::{FleetPoller, FleetReport};
use influx_sink::InfluxWriter;
use mkv_client::MkvClient;

pub use config::{parse_device_list, CollectorConfig};
pub use logging::init_logging;

/// Builds the client and sink from `config` and polls every configured device once.
pub async fn run_once(config: &CollectorConfig) -> Result<FleetReport> {
    if config.devices.is_empty() {
        warn!("no devices configured");
    }

    let client = MkvClient::new(config.client.clone()).context("http client init failed")?;
    let writer = match config.influx.clone() {
        Some(influx) => {
            info!(url = %influx.url, database = %influx.database, "writing to influxdb");
            InfluxWriter::new_http(influx).context("influxdb writer init failed")?
        }
        None => {
            warn!("influx.url not set, measurements will only be logged");
            InfluxWriter::new_mock()
        }
    };

    let fleet = FleetPoller::new(config.devices.clone(), client, config.poller.clone());
    Ok(fleet.run_cycle(&writer).await)
}
