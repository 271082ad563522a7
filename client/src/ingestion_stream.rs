use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ingestion_protocol::{ForwardHandle, IngestionTransport, RequestUid, ResponseSink, StreamMode};
use ingestion_std::errors::{StreamError, TransportError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::staging_buffer::StagingBuffer;

/// Lifecycle of one open streaming RPC, mirroring the client-visible states
/// of the underlying transport: a stream is opened, forwards messages while
/// its source keeps supplying them, then half-closes from the client side
/// and waits for the remote side to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Created,
    Started,
    Streaming,
    HalfClosedByClient,
    Completed,
    Errored,
}

/// One worker of an IngestionChannel's pool: pulls WireMessages off a shared
/// StagingBuffer and forwards them over a single open RPC stream until the
/// buffer stops supplying, then half-closes. Multiple streams share one
/// buffer as competing consumers; ordering across streams is not
/// preserved, matching the channel-level fan-out semantics.
pub struct IngestionStream<T: IngestionTransport> {
    transport: Arc<T>,
    source: Arc<StagingBuffer>,
    mode: StreamMode,
    sink: Arc<dyn ResponseSink>,
    handle: AsyncMutex<Option<T::Forward>>,
    state: Mutex<StreamState>,
    error_flag: AtomicBool,
    transmitted: Arc<Mutex<Vec<RequestUid>>>,
    forwarded_count: AtomicU64,
    poll_timeout: Duration,
}

impl<T: IngestionTransport> fmt::Debug for IngestionStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionStream")
            .field("mode", &self.mode)
            .field("state", &*self.state.lock().unwrap())
            .finish()
    }
}

impl<T: IngestionTransport> IngestionStream<T> {
    pub fn new(
        transport: Arc<T>,
        source: Arc<StagingBuffer>,
        mode: StreamMode,
        sink: Arc<dyn ResponseSink>,
        transmitted: Arc<Mutex<Vec<RequestUid>>>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            source,
            mode,
            sink,
            handle: AsyncMutex::new(None),
            state: Mutex::new(StreamState::Created),
            error_flag: AtomicBool::new(false),
            transmitted,
            forwarded_count: AtomicU64::new(0),
            poll_timeout,
        }
    }

    pub fn state(&self) -> StreamState {
        *self.state.lock().unwrap()
    }

    pub fn forwarded_count(&self) -> u64 {
        self.forwarded_count.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: StreamState) {
        *self.state.lock().unwrap() = state;
    }

    async fn open_handle(&self) -> Result<T::Forward, TransportError> {
        match self.mode {
            StreamMode::Forward => self.transport.ingest_data_stream(self.sink.clone()).await,
            StreamMode::Bidirectional => self.transport.ingest_data_bidi_stream(self.sink.clone()).await,
        }
    }

    async fn close_with_error(&self, message: &str) {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.as_mut() {
            let _ = handle.error_close(TransportError::StreamError(message.to_string())).await;
        }
    }

    /// Drives the stream to completion: opens it, forwards every message the
    /// source yields, then half-closes. Returns once the stream has reached
    /// a terminal state (`Completed` or `Errored`).
    pub async fn run(self: Arc<Self>) -> Result<(), StreamError> {
        self.set_state(StreamState::Started);

        match self.open_handle().await {
            Ok(handle) => {
                *self.handle.lock().await = Some(handle);
            }
            Err(err) => {
                self.set_state(StreamState::Errored);
                return Err(err.into());
            }
        }

        self.set_state(StreamState::Streaming);

        loop {
            if self.error_flag.load(Ordering::SeqCst) {
                self.close_with_error("terminated externally").await;
                self.set_state(StreamState::Errored);
                return Err(StreamError::Terminated);
            }

            match self.source.poll_timeout(self.poll_timeout).await {
                Some(message) => {
                    let uid = message.request_uid.clone();
                    let send_result = {
                        let mut guard = self.handle.lock().await;
                        guard.as_mut().expect("handle opened above").send(message).await
                    };

                    if let Err(err) = send_result {
                        self.error_flag.store(true, Ordering::SeqCst);
                        self.set_state(StreamState::Errored);
                        self.close_with_error(&err.to_string()).await;
                        return Err(StreamError::Transport(err));
                    }

                    self.transmitted.lock().unwrap().push(uid);
                    self.forwarded_count.fetch_add(1, Ordering::SeqCst);
                }
                None => {
                    if !self.source.is_supplying() {
                        break;
                    }
                }
            }
        }

        self.set_state(StreamState::HalfClosedByClient);

        let half_close_result = {
            let mut guard = self.handle.lock().await;
            guard.as_mut().expect("handle opened above").half_close().await
        };

        if let Err(err) = half_close_result {
            self.set_state(StreamState::Errored);
            return Err(StreamError::Transport(err));
        }

        self.set_state(StreamState::Completed);
        debug!(forwarded = self.forwarded_count(), "stream completed");
        Ok(())
    }

    /// Idempotent: forces the stream into `Errored`, asking the transport to
    /// tear down the underlying RPC. Safe to call whether or not `run` has
    /// started, and safe to call more than once.
    pub async fn terminate(&self) {
        if self.error_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("stream terminated externally");
        self.close_with_error("terminated externally").await;
        self.set_state(StreamState::Errored);
    }
}
