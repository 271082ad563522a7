use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ingestion_std::errors::TransportError;

use crate::frame::WireMessage;
use crate::ids::ProviderUid;
use crate::response::IngestionResponse;

/// Forward-only streams expect a single terminal summary; bidirectional
/// streams expect one acknowledgement per request. Modeled as a tagged
/// variant rather than an inheritance hierarchy: one worker type
/// parameterized by mode, differing only in which RPC is opened and how
/// many responses are expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Forward,
    Bidirectional,
}

impl std::str::FromStr for StreamMode {
    type Err = ingestion_std::errors::BadArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FORWARD" => Ok(Self::Forward),
            "BIDIRECTIONAL" => Ok(Self::Bidirectional),
            other => Err(ingestion_std::errors::BadArgumentError::UnsupportedStreamType(
                other.to_string(),
            )),
        }
    }
}

/// A registration request: provider name plus free-form attributes. Modeled
/// as the pre-stream interface that yields a `ProviderUid`; the concrete
/// unary RPC is an external collaborator.
#[derive(Debug, Clone)]
pub struct ProviderRegistration {
    pub name: String,
    pub attributes: HashMap<String, String>,
}

impl ProviderRegistration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// The provider-registration unary call. A faithful rewrite exposes this as
/// an interface and lets callers (or tests) supply a fake, rather than
/// carrying a process-global registry.
#[async_trait]
pub trait ProviderRegistrar: Send + Sync {
    async fn register_provider(&self, request: ProviderRegistration) -> Result<ProviderUid, TransportError>;
}

/// The client-side handle of one open streaming RPC.
#[async_trait]
pub trait ForwardHandle: Send {
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError>;
    async fn half_close(&mut self) -> Result<(), TransportError>;
    async fn error_close(&mut self, cause: TransportError) -> Result<(), TransportError>;
}

/// Receives responses for one open stream. Invoked under the caller's
/// synchronization (the IngestionStream drives delivery, the IngestionChannel
/// owns the accumulation behind this trait).
pub trait ResponseSink: Send + Sync {
    fn on_next(&self, response: IngestionResponse);
    fn on_error(&self, cause: &TransportError);
    fn on_completed(&self);
}

/// The remote-service-facing surface: opens forward or bidirectional
/// streams. The transport library itself (connection management, wire
/// codec) is out of scope; only this interface is specified.
#[async_trait]
pub trait IngestionTransport: Send + Sync {
    type Forward: ForwardHandle;

    async fn ingest_data_stream(
        &self,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Self::Forward, TransportError>;

    async fn ingest_data_bidi_stream(
        &self,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Self::Forward, TransportError>;
}
