mod support;

use std::sync::Arc;
use std::time::Duration;

use ingestion_client::{IngestionConfig, Orchestrator};
use ingestion_protocol::ProviderRegistration;
use support::{FakeRegistrar, FakeTransport, TestFrame};

/// A buffer that can hold roughly two messages at a time, fed by a
/// deliberately slow remote: every `ingest` has to contend with the
/// buffer's offer-blocks-while-full loop, and the session still has to
/// complete without losing or duplicating a single request.
#[tokio::test]
async fn ingestion_completes_under_tight_buffer_backpressure() {
    let transport = Arc::new(FakeTransport::acking().with_delay(Duration::from_millis(5)));
    let config = IngestionConfig::default()
        .with_buffer_capacity(64)
        .unwrap()
        .without_decomposition();
    let orchestrator = Orchestrator::new(Arc::new(FakeRegistrar), transport, config);

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();

    for i in 0..50 {
        orchestrator
            .ingest(Box::new(TestFrame::new(32, 1, Some(&format!("req-{i}")))))
            .await
            .unwrap();
    }

    let result = orchestrator.close_stream(Duration::from_secs(10)).await.unwrap();
    assert_eq!(result.requests_transmitted.len(), 50);
    assert_eq!(result.requests_acknowledged.len(), 50);
    assert!(!result.has_exception());
}
