use std::env;

use anyhow::{Context, Result};
use tracing::info;

use collector_app::{init_logging, run_once, CollectorConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = parse_config_arg();
    let config = CollectorConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;
    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref())
        .context("logging init failed")?;

    info!(devices = config.devices.len(), "starting poll cycle");
    let report = run_once(&config).await?;
    info!(
        received = report.received(),
        not_received = report.not_received(),
        "poll cycle finished"
    );
    Ok(())
}

fn parse_config_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}
