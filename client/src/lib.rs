//! Client-side ingestion pipeline for the Data Platform: decomposes
//! oversized frames, buffers them under backpressure, and streams them to
//! a remote ingestion service over one or more concurrent RPC streams.
//!
//! The pipeline is transport-agnostic: callers supply their own
//! [`ingestion_protocol::IngestionTransport`] and
//! [`ingestion_protocol::ProviderRegistrar`] implementations (gRPC, an
//! in-process fake for tests, or anything else that opens the two
//! required stream kinds).

pub mod config;
pub mod frame_processor;
pub mod ingestion_channel;
pub mod ingestion_stream;
pub mod orchestrator;
pub mod staging_buffer;

pub use config::IngestionConfig;
pub use frame_processor::FrameProcessor;
pub use ingestion_channel::IngestionChannel;
pub use ingestion_stream::{IngestionStream, StreamState};
pub use orchestrator::Orchestrator;
pub use staging_buffer::{BufferBound, StagingBuffer};

pub use ingestion_protocol as protocol;
pub use ingestion_std as standard;
