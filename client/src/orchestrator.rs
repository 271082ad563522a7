use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ingestion_protocol::{
    IngestionFrame, IngestionResult, IngestionTransport, ProviderRegistrar, ProviderRegistration,
};
use ingestion_std::errors::{OrchestratorError, PreconditionError, TransferError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::IngestionConfig;
use crate::frame_processor::FrameProcessor;
use crate::ingestion_channel::IngestionChannel;
use crate::staging_buffer::{BufferBound, StagingBuffer};

const TRANSFER_POLL_INTERVAL: Duration = Duration::from_millis(15);

/// The client-facing facade: opens one provider's session, accepts frames
/// into the FrameProcessor, and runs a background task ferrying its wire
/// messages into the StagingBuffer that the IngestionChannel's stream pool
/// drains. One Orchestrator instance models one open stream at a time;
/// `openStream`/`closeStream` bracket its lifetime.
pub struct Orchestrator<T: IngestionTransport + 'static> {
    registrar: Arc<dyn ProviderRegistrar>,
    config: IngestionConfig,
    processor: Arc<FrameProcessor>,
    buffer: Arc<StagingBuffer>,
    channel: Arc<IngestionChannel<T>>,
    transfer_handle: Mutex<Option<JoinHandle<Result<(), TransferError>>>>,
    open: AtomicBool,
}

impl<T: IngestionTransport + 'static> Orchestrator<T> {
    pub fn new(registrar: Arc<dyn ProviderRegistrar>, transport: Arc<T>, config: IngestionConfig) -> Self {
        let bound = BufferBound::Allocation;
        let buffer = Arc::new(StagingBuffer::new(config.buffer_capacity_bytes, bound));
        let channel = Arc::new(IngestionChannel::new(transport, buffer.clone(), TRANSFER_POLL_INTERVAL));

        Self {
            registrar,
            config,
            processor: Arc::new(FrameProcessor::new()),
            buffer,
            channel,
            transfer_handle: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Registers the provider, wires up FrameProcessor/StagingBuffer/
    /// IngestionChannel from the configured options, and starts the
    /// background transfer task. Only one stream may be open at a time.
    pub async fn open_stream(&self, registration: ProviderRegistration) -> Result<(), OrchestratorError> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Err(PreconditionError::StreamAlreadyOpen.into());
        }

        if let Err(err) = self.open_stream_inner(registration).await {
            self.open.store(false, Ordering::SeqCst);
            return Err(err);
        }

        Ok(())
    }

    async fn open_stream_inner(&self, registration: ProviderRegistration) -> Result<(), OrchestratorError> {
        let provider_uid = self
            .registrar
            .register_provider(registration)
            .await
            .map_err(OrchestratorError::RegistrationFailed)?;

        self.processor.set_provider(provider_uid);
        match self.config.decompose_max_bytes {
            Some(max_bytes) => self.processor.set_frame_decomposition(max_bytes),
            None => self.processor.disable_frame_decomposition(),
        }
        match self.config.processing_concurrency {
            Some(threads) => self.processor.set_concurrency(threads),
            None => self.processor.disable_concurrency(),
        }
        self.processor.activate()?;

        if self.config.buffer_back_pressure {
            self.buffer.enable_back_pressure();
        } else {
            self.buffer.disable_back_pressure();
        }
        self.buffer.activate();

        self.channel.set_stream_type(self.config.stream_type);
        match self.config.stream_concurrency {
            Some(streams) => self.channel.set_multiple_streams(streams)?,
            None => self.channel.disable_multiple_streams(),
        }
        self.channel.activate().await?;

        let processor = self.processor.clone();
        let buffer = self.buffer.clone();
        let handle = tokio::spawn(run_transfer(processor, buffer));
        *self.transfer_handle.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Submits one frame to the FrameProcessor. When configured with
    /// orchestrator-level backpressure, blocks until the StagingBuffer has
    /// room before handing the frame to the processor, so a fast producer
    /// can't pile up decomposed output the buffer has no space for.
    pub async fn ingest(&self, frame: Box<dyn IngestionFrame>) -> Result<(), OrchestratorError> {
        if !self.is_open() {
            return Err(PreconditionError::StreamNotOpen.into());
        }

        if self.config.orchestrator_back_pressure {
            self.buffer.await_queue_ready().await;
        }

        self.processor.submit(frame)?;
        Ok(())
    }

    /// Every request uid transmitted so far this session, across all
    /// streams.
    pub fn get_request_ids(&self) -> Vec<ingestion_protocol::RequestUid> {
        self.channel.get_request_ids()
    }

    pub async fn await_queue_ready(&self) {
        self.buffer.await_queue_ready().await;
    }

    /// Loops on the buffer's own empty-wait while the FrameProcessor still
    /// has in-flight or queued work, since the transfer task can still push
    /// more output into the buffer after it drains once.
    pub async fn await_queue_empty(&self) {
        while self.processor.is_supplying() {
            self.buffer.await_queue_empty().await;
        }
    }

    /// Stops accepting new frames, lets queued work drain through the
    /// transfer task and the channel's stream pool within `timeout`, then
    /// returns the session's reconciled result. A transfer task failure
    /// forces a hard shutdown before the error is surfaced.
    pub async fn close_stream(&self, timeout: Duration) -> Result<IngestionResult, OrchestratorError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Err(PreconditionError::StreamNotOpen.into());
        }

        self.processor.shutdown();

        let transfer_handle = self.transfer_handle.lock().unwrap().take();
        if let Some(handle) = transfer_handle {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(transfer_err))) => {
                    warn!(error = %transfer_err, "transfer task failed; hard-shutting-down stream");
                    self.hard_shutdown().await;
                    return Err(OrchestratorError::Completion(transfer_err));
                }
                Ok(Err(_join_err)) => {
                    self.hard_shutdown().await;
                    return Err(OrchestratorError::Interrupted);
                }
                Err(_elapsed) => {
                    warn!("transfer task did not finish within shutdown timeout; forcing shutdown");
                    self.hard_shutdown().await;
                }
            }
        }

        self.channel.shutdown(timeout).await;
        Ok(self.channel.get_ingestion_result())
    }

    /// Abandons in-flight work immediately: aborts the transfer task, hard-
    /// shuts-down the FrameProcessor, StagingBuffer and IngestionChannel,
    /// and returns whatever result had already accumulated.
    pub async fn close_stream_now(&self) -> IngestionResult {
        self.open.store(false, Ordering::SeqCst);
        if let Some(handle) = self.transfer_handle.lock().unwrap().take() {
            handle.abort();
        }
        self.hard_shutdown().await;
        self.channel.get_ingestion_result()
    }

    async fn hard_shutdown(&self) {
        self.processor.shutdown_now();
        self.buffer.shutdown_now();
        self.channel.shutdown_now().await;
    }

    /// No-op when no stream is open; otherwise equivalent to `closeStream`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<IngestionResult, OrchestratorError> {
        if !self.is_open() {
            return Ok(IngestionResult::null());
        }
        self.close_stream(timeout).await
    }

    /// No-op when no stream is open; otherwise equivalent to
    /// `closeStreamNow`.
    pub async fn shutdown_now(&self) -> IngestionResult {
        if !self.is_open() {
            return IngestionResult::null();
        }
        self.close_stream_now().await
    }
}

/// Ferries wire messages from the FrameProcessor's output to the
/// StagingBuffer until the processor stops supplying, then shuts the
/// buffer down gracefully so its consuming streams see exhaustion rather
/// than hanging indefinitely.
async fn run_transfer(processor: Arc<FrameProcessor>, buffer: Arc<StagingBuffer>) -> Result<(), TransferError> {
    loop {
        match processor.poll_timeout(TRANSFER_POLL_INTERVAL).await {
            Some(message) => {
                buffer.offer(message).await?;
            }
            None => {
                if !processor.is_supplying() {
                    break;
                }
            }
        }
    }

    buffer.shutdown();
    Ok(())
}
