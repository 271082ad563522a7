mod support;

use std::sync::Arc;
use std::time::Duration;

use ingestion_client::{IngestionConfig, Orchestrator};
use ingestion_protocol::ProviderRegistration;
use support::{FakeRegistrar, FakeTransport, SendOutcome, TestFrame};

#[tokio::test]
async fn remote_rejection_surfaces_as_exception() {
    let transport = Arc::new(FakeTransport::with_outcome(|message| {
        if message.request_uid.as_str() == "bad-request" {
            SendOutcome::Reject("schema validation failed".into())
        } else {
            SendOutcome::Ack
        }
    }));
    let config = IngestionConfig::default().without_decomposition();
    let orchestrator = Orchestrator::new(Arc::new(FakeRegistrar), transport, config);

    orchestrator
        .open_stream(ProviderRegistration::new("sensor-1"))
        .await
        .unwrap();
    orchestrator
        .ingest(Box::new(TestFrame::new(32, 1, Some("good-request"))))
        .await
        .unwrap();
    orchestrator
        .ingest(Box::new(TestFrame::new(32, 1, Some("bad-request"))))
        .await
        .unwrap();

    let result = orchestrator.close_stream(Duration::from_secs(5)).await.unwrap();

    assert_eq!(result.requests_transmitted.len(), 2);
    assert_eq!(result.requests_acknowledged.len(), 1);
    assert!(result.has_exception());
    assert_eq!(result.exceptions.len(), 1);
    assert_eq!(
        result.exceptions[0].request_uid.as_ref().unwrap().as_str(),
        "bad-request"
    );
}
