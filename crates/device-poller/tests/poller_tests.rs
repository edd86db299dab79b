use std::sync::Mutex;

use async_trait::async_trait;
use device_poller::{
    DevicePoller, DeviceResult, FleetPoller, PollError, PollOutcome, PollState, PollerConfig,
};
use influx_sink::{MeasurementSink, SinkError};
use mkv_client::{ClientConfig, MkvClient};
use register_decoder::{CURRENT_LAYOUT, LEGACY_LAYOUT};
use types::{DeviceDescriptor, DeviceFamily, MeasurementBatch};
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<MeasurementBatch>>,
    reject: bool,
}

#[async_trait]
impl MeasurementSink for RecordingSink {
    async fn write_batch(&self, batch: &MeasurementBatch) -> Result<(), SinkError> {
        if self.reject {
            return Err(SinkError::Status {
                status: 500,
                body: "unavailable".to_string(),
            });
        }
        self.batches.lock().expect("sink lock").push(batch.clone());
        Ok(())
    }
}

fn zero_response(count: usize) -> String {
    "00000000".repeat(count)
}

fn client() -> MkvClient {
    let mut config = ClientConfig::default();
    config.timeout_ms = 500;
    MkvClient::new(config).expect("client")
}

fn device(server: &MockServer, tag: &str, family: DeviceFamily) -> DeviceDescriptor {
    DeviceDescriptor {
        address: server.address().to_string(),
        tag: tag.to_string(),
        location: "Compressor Room".to_string(),
        family,
    }
}

async fn controller(family: DeviceFamily, status: u16, body: String) -> MockServer {
    let payload = match family {
        DeviceFamily::Legacy => LEGACY_LAYOUT.request_payload,
        DeviceFamily::Current => CURRENT_LAYOUT.request_payload,
    };
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cgi-bin/mkv.cgi"))
        .and(body_string(payload))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn poll_once_returns_to_idle_with_one_timestamp() {
    let server = controller(DeviceFamily::Legacy, 200, zero_response(99)).await;
    let mut poller = DevicePoller::new(device(&server, "080BL515", DeviceFamily::Legacy), client());

    let outcome = poller.poll_once().await;
    assert_eq!(poller.state(), PollState::Idle);

    let batch = outcome.batch().expect("batch");
    assert_eq!(batch.len(), LEGACY_LAYOUT.entries.len());
    assert!(batch
        .measurements
        .iter()
        .all(|m| m.captured_at == batch.captured_at));
    assert_eq!(batch.captured_at.timestamp_subsec_nanos(), 0);
}

#[tokio::test]
async fn short_response_fails_the_device_cycle() {
    let server = controller(DeviceFamily::Current, 200, zero_response(99)).await;
    let mut poller = DevicePoller::new(device(&server, "080BL517", DeviceFamily::Current), client());

    match poller.poll_once().await {
        PollOutcome::Failed(PollError::Decode(_)) => {}
        other => panic!("expected decode failure, got {other:?}"),
    }
    assert_eq!(poller.state(), PollState::Idle);
}

#[tokio::test]
async fn error_status_is_a_protocol_error() {
    let server = controller(DeviceFamily::Legacy, 500, String::new()).await;
    let mut poller = DevicePoller::new(device(&server, "080BL516", DeviceFamily::Legacy), client());

    assert!(matches!(
        poller.poll_once().await,
        PollOutcome::Failed(PollError::Protocol { status: 500, .. })
    ));
}

async fn run_fleet(max_concurrency: usize) {
    let a = controller(DeviceFamily::Legacy, 200, zero_response(99)).await;
    let b = controller(DeviceFamily::Legacy, 503, String::new()).await;
    let c = controller(DeviceFamily::Current, 200, zero_response(176)).await;

    let mut devices = vec![
        device(&a, "080BL515", DeviceFamily::Legacy),
        device(&b, "080BL516", DeviceFamily::Legacy),
        device(&c, "080BL517", DeviceFamily::Current),
    ];
    devices.push(DeviceDescriptor {
        address: "127.0.0.1:1".to_string(),
        tag: "900CP110".to_string(),
        location: "Compressor Room".to_string(),
        family: DeviceFamily::Legacy,
    });

    let fleet = FleetPoller::new(devices, client(), PollerConfig { max_concurrency });
    let sink = RecordingSink::default();
    let report = fleet.run_cycle(&sink).await;

    let tags: Vec<&str> = report.devices.iter().map(|r| r.tag.as_str()).collect();
    assert_eq!(tags, vec!["080BL515", "080BL516", "080BL517", "900CP110"]);
    assert_eq!(report.received(), 2);
    assert_eq!(report.not_received(), 2);
    assert!(matches!(
        report.devices[0].result,
        DeviceResult::Stored { measurements: 28, missing: 0 }
    ));
    assert!(matches!(report.devices[1].result, DeviceResult::NotReceived { .. }));
    assert!(matches!(
        report.devices[2].result,
        DeviceResult::Stored { measurements: 37, .. }
    ));
    assert!(matches!(report.devices[3].result, DeviceResult::NotReceived { .. }));

    let batches = sink.batches.lock().expect("sink lock");
    assert_eq!(batches.len(), 2);
    for left in batches[0].measurements.iter() {
        assert!(batches[1].measurements.iter().all(|right| right.key != left.key));
    }
}

#[tokio::test]
async fn fleet_continues_past_failed_devices() {
    run_fleet(1).await;
}

#[tokio::test]
async fn concurrent_fleet_keeps_device_isolation() {
    run_fleet(3).await;
}

#[tokio::test]
async fn sink_failure_is_reported_not_fatal() {
    let a = controller(DeviceFamily::Legacy, 200, zero_response(99)).await;
    let b = controller(DeviceFamily::Current, 200, zero_response(176)).await;
    let fleet = FleetPoller::new(
        vec![
            device(&a, "080BL515", DeviceFamily::Legacy),
            device(&b, "080BL517", DeviceFamily::Current),
        ],
        client(),
        PollerConfig::default(),
    );
    let sink = RecordingSink {
        reject: true,
        ..RecordingSink::default()
    };

    let report = fleet.run_cycle(&sink).await;
    assert_eq!(report.received(), 2);
    assert_eq!(report.store_failures(), 2);
}
