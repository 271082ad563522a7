mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use ingestion_client::{IngestionConfig, Orchestrator};
use ingestion_protocol::{ProviderRegistration, StreamMode};
use support::{FakeRegistrar, FakeTransport, TestFrame};

#[tokio::test]
async fn forward_mode_fans_out_across_multiple_streams() {
    let transport = Arc::new(FakeTransport::acking());
    let opens = transport.opens.clone();

    let config = IngestionConfig::default()
        .with_stream_type(StreamMode::Forward)
        .with_stream_concurrency(4)
        .unwrap();
    let orchestrator = Orchestrator::new(Arc::new(FakeRegistrar), transport, config);

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();

    for i in 0..200 {
        orchestrator
            .ingest(Box::new(TestFrame::new(64, 4, Some(&format!("req-{i}")))))
            .await
            .unwrap();
    }

    let result = orchestrator.close_stream(Duration::from_secs(10)).await.unwrap();
    assert_eq!(result.requests_transmitted.len(), 200);
    assert_eq!(result.requests_acknowledged.len(), 200);
    assert!(!result.has_exception());
    assert_eq!(opens.load(Ordering::SeqCst), 4);
}
