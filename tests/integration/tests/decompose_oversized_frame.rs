mod support;

use std::sync::Arc;
use std::time::Duration;

use ingestion_client::{IngestionConfig, Orchestrator};
use ingestion_protocol::ProviderRegistration;
use support::{FakeRegistrar, FakeTransport, TestFrame};

#[tokio::test]
async fn oversized_frame_decomposes_into_three_messages() {
    let transport = Arc::new(FakeTransport::acking());
    let config = IngestionConfig::default()
        .with_decompose_max_bytes(4 * 1024 * 1024)
        .unwrap();
    let orchestrator = Orchestrator::new(Arc::new(FakeRegistrar), transport, config);

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();
    // 10 MB at 1 KB/sample, 4 MB max -> three conforming sub-messages.
    orchestrator
        .ingest(Box::new(TestFrame::new(1024, 10 * 1024, Some("u1"))))
        .await
        .unwrap();

    let result = orchestrator.close_stream(Duration::from_secs(5)).await.unwrap();

    let mut uids: Vec<String> = result
        .requests_transmitted
        .iter()
        .map(|uid| uid.as_str().to_string())
        .collect();
    uids.sort();
    assert_eq!(uids, vec!["u1#1", "u1#2", "u1#3"]);
    assert_eq!(result.requests_acknowledged.len(), 3);
    assert!(!result.has_exception());
}
