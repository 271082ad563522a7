mod support;

use std::sync::Arc;
use std::time::Duration;

use ingestion_client::{IngestionConfig, Orchestrator};
use ingestion_protocol::ProviderRegistration;
use support::{FakeRegistrar, FakeTransport, TestFrame};

#[tokio::test]
async fn hard_shutdown_abandons_in_flight_work_without_hanging() {
    let transport = Arc::new(FakeTransport::acking().with_delay(Duration::from_millis(200)));
    let config = IngestionConfig::default().without_decomposition();
    let orchestrator = Orchestrator::new(Arc::new(FakeRegistrar), transport, config);

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();

    for i in 0..5 {
        orchestrator
            .ingest(Box::new(TestFrame::new(32, 1, Some(&format!("req-{i}")))))
            .await
            .unwrap();
    }

    // Let the stream pick up at least one message and start its
    // artificially slow send before pulling the plug.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let result = orchestrator.close_stream_now().await;

    assert!(!orchestrator.is_open());
    assert!(result.requests_acknowledged.len() <= result.requests_transmitted.len());
}
