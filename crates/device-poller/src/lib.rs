use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use influx_sink::MeasurementSink;
use mkv_client::{ClientError, MkvClient};
use register_decoder::{build_batch, decode_response, DecodeError, FamilyLayout};
use types::{DeviceDescriptor, MeasurementBatch};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Devices polled at once. `1` polls strictly in list order.
    pub max_concurrency: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("network error: {0}")]
    Network(ClientError),
    #[error("controller returned status {status} ({reason})")]
    Protocol { status: u16, reason: String },
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl From<ClientError> for PollError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { status, reason } => Self::Protocol { status, reason },
            other => Self::Network(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Success,
    RequestFailed,
}

#[derive(Debug)]
pub enum PollOutcome {
    Success(MeasurementBatch),
    Failed(PollError),
}

impl PollOutcome {
    pub fn batch(&self) -> Option<&MeasurementBatch> {
        match self {
            Self::Success(batch) => Some(batch),
            Self::Failed(_) => None,
        }
    }
}

/// Runs poll cycles for one compressor.
pub struct DevicePoller {
    device: DeviceDescriptor,
    layout: &'static FamilyLayout,
    client: MkvClient,
    state: PollState,
}

impl DevicePoller {
    pub fn new(device: DeviceDescriptor, client: MkvClient) -> Self {
        let layout = FamilyLayout::for_family(device.family);
        Self {
            device,
            layout,
            client,
            state: PollState::Idle,
        }
    }

    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// One request/decode cycle. Never retries; the poller is idle again on return.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let captured_at = Utc::now();
        let started = Instant::now();
        self.transition(PollState::Requesting);

        let outcome = match self.fetch_and_decode().await {
            Ok(set) => {
                self.transition(PollState::Success);
                PollOutcome::Success(build_batch(&self.device, &set, captured_at))
            }
            Err(err) => {
                self.transition(PollState::RequestFailed);
                warn!(
                    device = %self.device.tag,
                    address = %self.device.address,
                    error = %err,
                    "data NOT RECEIVED"
                );
                PollOutcome::Failed(err)
            }
        };

        debug!(
            device = %self.device.tag,
            elapsed_ms = started.elapsed().as_millis(),
            "poll cycle complete"
        );
        self.transition(PollState::Idle);
        outcome
    }

    async fn fetch_and_decode(&self) -> Result<types::MeasurementSet, PollError> {
        let raw = self
            .client
            .fetch(&self.device.address, self.layout.request_payload)
            .await?;
        Ok(decode_response(self.layout, &raw)?)
    }

    fn transition(&mut self, next: PollState) {
        debug!(device = %self.device.tag, from = ?self.state, to = ?next, "poller state");
        self.state = next;
    }
}

/// Per-device result of one fleet pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceResult {
    Stored { measurements: usize, missing: usize },
    StoreFailed { measurements: usize, error: String },
    NotReceived { error: String },
}

#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub tag: String,
    pub address: String,
    pub result: DeviceResult,
}

#[derive(Debug, Clone, Default)]
pub struct FleetReport {
    /// One entry per configured device, in configuration order.
    pub devices: Vec<DeviceReport>,
}

impl FleetReport {
    pub fn received(&self) -> usize {
        self.devices
            .iter()
            .filter(|report| !matches!(report.result, DeviceResult::NotReceived { .. }))
            .count()
    }

    pub fn not_received(&self) -> usize {
        self.devices.len() - self.received()
    }

    pub fn store_failures(&self) -> usize {
        self.devices
            .iter()
            .filter(|report| matches!(report.result, DeviceResult::StoreFailed { .. }))
            .count()
    }
}

/// One pass over a static device list.
pub struct FleetPoller {
    devices: Vec<DeviceDescriptor>,
    client: MkvClient,
    config: PollerConfig,
}

impl FleetPoller {
    pub fn new(devices: Vec<DeviceDescriptor>, client: MkvClient, config: PollerConfig) -> Self {
        Self {
            devices,
            client,
            config,
        }
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Polls every device once and hands each decoded batch to `sink`.
    /// Device and sink failures are logged and reported, never propagated.
    pub async fn run_cycle(&self, sink: &dyn MeasurementSink) -> FleetReport {
        let started = Instant::now();
        let mut reports: Vec<DeviceReport> = self
            .devices
            .iter()
            .map(|device| DeviceReport {
                tag: device.tag.clone(),
                address: device.address.clone(),
                result: DeviceResult::NotReceived {
                    error: "poll task did not complete".to_string(),
                },
            })
            .collect();

        if self.config.max_concurrency <= 1 {
            for (index, device) in self.devices.iter().enumerate() {
                let mut poller = DevicePoller::new(device.clone(), self.client.clone());
                let outcome = poller.poll_once().await;
                reports[index].result = deliver(device, outcome, sink).await;
            }
        } else {
            let permits = Arc::new(Semaphore::new(self.config.max_concurrency));
            let mut join_set = JoinSet::new();
            for (index, device) in self.devices.iter().enumerate() {
                let permits = permits.clone();
                let mut poller = DevicePoller::new(device.clone(), self.client.clone());
                join_set.spawn(async move {
                    let _permit = permits.acquire_owned().await;
                    (index, poller.poll_once().await)
                });
            }

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((index, outcome)) => {
                        reports[index].result = deliver(&self.devices[index], outcome, sink).await;
                    }
                    Err(err) => {
                        warn!(error = %err, "poll task failed");
                    }
                }
            }
        }

        let report = FleetReport { devices: reports };
        info!(
            devices = report.devices.len(),
            received = report.received(),
            not_received = report.not_received(),
            store_failures = report.store_failures(),
            elapsed_ms = started.elapsed().as_millis(),
            "fleet cycle complete"
        );
        report
    }
}

async fn deliver(
    device: &DeviceDescriptor,
    outcome: PollOutcome,
    sink: &dyn MeasurementSink,
) -> DeviceResult {
    let batch = match outcome {
        PollOutcome::Success(batch) => batch,
        PollOutcome::Failed(err) => {
            return DeviceResult::NotReceived {
                error: err.to_string(),
            }
        }
    };

    let measurements = batch.len();
    let missing = batch.missing_count();
    if batch.is_empty() {
        info!(device = %device.tag, "data OK, nothing to store");
        return DeviceResult::Stored {
            measurements,
            missing,
        };
    }

    match sink.write_batch(&batch).await {
        Ok(()) => {
            info!(device = %device.tag, measurements, missing, "data OK");
            DeviceResult::Stored {
                measurements,
                missing,
            }
        }
        Err(err) => {
            warn!(device = %device.tag, error = %err, "storing batch failed");
            DeviceResult::StoreFailed {
                measurements,
                error: err.to_string(),
            }
        }
    }
}
