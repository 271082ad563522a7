mod support;

use std::sync::Arc;
use std::time::Duration;

use ingestion_client::{IngestionConfig, Orchestrator};
use ingestion_protocol::ProviderRegistration;
use support::{FakeRegistrar, FakeTransport, TestFrame};

#[tokio::test]
async fn second_session_yields_an_independent_result() {
    let transport = Arc::new(FakeTransport::acking());
    let orchestrator = Orchestrator::new(Arc::new(FakeRegistrar), transport, IngestionConfig::default());

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();
    orchestrator
        .ingest(Box::new(TestFrame::new(1024, 10, Some("first-1"))))
        .await
        .unwrap();
    orchestrator
        .ingest(Box::new(TestFrame::new(1024, 10, Some("first-2"))))
        .await
        .unwrap();
    let first = orchestrator.close_stream(Duration::from_secs(5)).await.unwrap();
    assert_eq!(first.requests_transmitted.len(), 2);
    assert_eq!(first.requests_acknowledged.len(), 2);
    assert!(!first.has_exception());

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();
    orchestrator
        .ingest(Box::new(TestFrame::new(1024, 10, Some("second-1"))))
        .await
        .unwrap();
    let second = orchestrator.close_stream(Duration::from_secs(5)).await.unwrap();

    assert_eq!(second.requests_transmitted.len(), 1);
    assert_eq!(second.requests_acknowledged.len(), 1);
    assert!(!second.has_exception());
    assert_eq!(second.requests_transmitted[0].as_str(), "second-1");
}
