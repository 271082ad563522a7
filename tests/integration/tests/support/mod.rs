use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ingestion_protocol::{
    ExceptionReport, ForwardHandle, IngestionFrame, IngestionResponse, IngestionTransport,
    ProviderRegistrar, ProviderRegistration, ProviderUid, RequestUid, ResponseSink, StreamMode,
    WireMessage,
};
use ingestion_std::errors::{ConversionFailure, TransportError};

/// What the fake remote service does with one sent message, scripted by the
/// test ahead of time.
#[derive(Clone)]
pub enum SendOutcome {
    Ack,
    Reject(String),
    TransportFail(String),
}

/// A column-free stand-in for a producer frame: one fixed-size payload, an
/// optional caller-assigned request uid.
#[derive(Debug, Clone)]
pub struct TestFrame {
    pub bytes_per_sample: u64,
    pub samples: usize,
    pub uid: Option<String>,
}

impl TestFrame {
    pub fn new(bytes_per_sample: u64, samples: usize, uid: Option<&str>) -> Self {
        Self {
            bytes_per_sample,
            samples,
            uid: uid.map(String::from),
        }
    }
}

impl IngestionFrame for TestFrame {
    fn serialized_allocation(&self) -> u64 {
        self.bytes_per_sample * self.samples as u64
    }

    fn sample_count(&self) -> usize {
        self.samples
    }

    fn request_uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    fn split_at(&self, sample_index: usize) -> (Box<dyn IngestionFrame>, Box<dyn IngestionFrame>) {
        let left = TestFrame {
            bytes_per_sample: self.bytes_per_sample,
            samples: sample_index,
            uid: self.uid.clone(),
        };
        let right = TestFrame {
            bytes_per_sample: self.bytes_per_sample,
            samples: self.samples - sample_index,
            uid: self.uid.clone(),
        };
        (Box::new(left), Box::new(right))
    }

    fn serialize(&self) -> Result<Bytes, ConversionFailure> {
        Ok(Bytes::from(vec![0u8; self.serialized_allocation() as usize]))
    }
}

pub struct FakeRegistrar;

#[async_trait]
impl ProviderRegistrar for FakeRegistrar {
    async fn register_provider(&self, _request: ProviderRegistration) -> Result<ProviderUid, TransportError> {
        Ok(ProviderUid::new("test-provider"))
    }
}

pub struct FakeHandle {
    mode: StreamMode,
    sink: Arc<dyn ResponseSink>,
    outcome_for: Arc<dyn Fn(&WireMessage) -> SendOutcome + Send + Sync>,
    send_delay: Option<Duration>,
    forward_acked: Vec<RequestUid>,
}

#[async_trait]
impl ForwardHandle for FakeHandle {
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError> {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = (self.outcome_for)(&message);
        let uid = message.request_uid.clone();

        match (self.mode, outcome) {
            (StreamMode::Bidirectional, SendOutcome::Ack) => {
                self.sink.on_next(IngestionResponse::ack(uid));
                Ok(())
            }
            (StreamMode::Bidirectional, SendOutcome::Reject(reason)) => {
                self.sink
                    .on_next(IngestionResponse::reject(uid.clone(), ExceptionReport::new(Some(uid), "Rejected", reason)));
                Ok(())
            }
            (StreamMode::Forward, SendOutcome::Ack) => {
                self.forward_acked.push(uid);
                Ok(())
            }
            (StreamMode::Forward, SendOutcome::Reject(reason)) => {
                self.sink
                    .on_next(IngestionResponse::reject(uid.clone(), ExceptionReport::new(Some(uid), "Rejected", reason)));
                Ok(())
            }
            (_, SendOutcome::TransportFail(reason)) => Err(TransportError::SendFailed(reason)),
        }
    }

    async fn half_close(&mut self) -> Result<(), TransportError> {
        if self.mode == StreamMode::Forward && !self.forward_acked.is_empty() {
            self.sink.on_next(IngestionResponse::summary(std::mem::take(&mut self.forward_acked)));
        }
        self.sink.on_completed();
        Ok(())
    }

    async fn error_close(&mut self, cause: TransportError) -> Result<(), TransportError> {
        self.sink.on_error(&cause);
        Ok(())
    }
}

/// A scriptable fake of the remote ingestion service. Every opened stream
/// shares the same outcome function, so a test can reject or fail specific
/// request uids deterministically.
pub struct FakeTransport {
    pub outcome_for: Arc<dyn Fn(&WireMessage) -> SendOutcome + Send + Sync>,
    pub send_delay: Option<Duration>,
    pub opens: Arc<AtomicUsize>,
}

impl FakeTransport {
    pub fn acking() -> Self {
        Self {
            outcome_for: Arc::new(|_| SendOutcome::Ack),
            send_delay: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_outcome(outcome_for: impl Fn(&WireMessage) -> SendOutcome + Send + Sync + 'static) -> Self {
        Self {
            outcome_for: Arc::new(outcome_for),
            send_delay: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }
}

#[async_trait]
impl IngestionTransport for FakeTransport {
    type Forward = FakeHandle;

    async fn ingest_data_stream(&self, sink: Arc<dyn ResponseSink>) -> Result<Self::Forward, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            mode: StreamMode::Forward,
            sink,
            outcome_for: self.outcome_for.clone(),
            send_delay: self.send_delay,
            forward_acked: Vec::new(),
        })
    }

    async fn ingest_data_bidi_stream(&self, sink: Arc<dyn ResponseSink>) -> Result<Self::Forward, TransportError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            mode: StreamMode::Bidirectional,
            sink,
            outcome_for: self.outcome_for.clone(),
            send_delay: self.send_delay,
            forward_acked: Vec::new(),
        })
    }
}

