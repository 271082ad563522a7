mod support;

use std::sync::Arc;
use std::time::Duration;

use ingestion_client::{IngestionConfig, Orchestrator};
use ingestion_protocol::ProviderRegistration;
use support::{FakeRegistrar, FakeTransport, TestFrame};

#[tokio::test]
async fn single_small_frame_is_acknowledged() {
    let transport = Arc::new(FakeTransport::acking());
    let orchestrator = Orchestrator::new(Arc::new(FakeRegistrar), transport, IngestionConfig::default());

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();
    orchestrator
        .ingest(Box::new(TestFrame::new(1024, 10, Some("req-1"))))
        .await
        .unwrap();

    let result = orchestrator.close_stream(Duration::from_secs(5)).await.unwrap();
    assert_eq!(result.requests_transmitted.len(), 1);
    assert_eq!(result.requests_acknowledged.len(), 1);
    assert!(!result.has_exception());
}
