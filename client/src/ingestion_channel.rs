use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use ingestion_protocol::{
    ExceptionReport, IngestionResponse, IngestionResult, IngestionTransport, RequestUid,
    ResponseSink, StreamMode,
};
use ingestion_std::errors::{ChannelError, PreconditionError, TransportError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::ingestion_stream::IngestionStream;
use crate::staging_buffer::StagingBuffer;

/// Routes responses from every worker stream into the accumulator matching
/// its open mode. Owned by the channel, shared with streams only through
/// the `ResponseSink` trait object, so streams never hold a reference back
/// to their channel.
struct ChannelSink {
    mode: StreamMode,
    forward_responses: Arc<Mutex<Vec<IngestionResponse>>>,
    bidi_responses: Arc<Mutex<Vec<IngestionResponse>>>,
    response_count: Arc<AtomicU64>,
}

impl ResponseSink for ChannelSink {
    fn on_next(&self, response: IngestionResponse) {
        match self.mode {
            StreamMode::Forward => self.forward_responses.lock().unwrap().push(response),
            StreamMode::Bidirectional => self.bidi_responses.lock().unwrap().push(response),
        }
        self.response_count.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, cause: &TransportError) {
        warn!(error = %cause, "stream reported a transport error");
    }

    fn on_completed(&self) {}
}

/// A pool of IngestionStream workers sharing one StagingBuffer. Owns the
/// response accumulators that `getIngestionResult` reconciles against the
/// set of transmitted request uids.
pub struct IngestionChannel<T: IngestionTransport> {
    transport: Arc<T>,
    source: Arc<StagingBuffer>,
    mode: Mutex<StreamMode>,
    multi_streams: Mutex<Option<u32>>,
    poll_timeout: Duration,
    active: AtomicBool,
    workers: Mutex<Vec<Arc<IngestionStream<T>>>>,
    handles: Mutex<Vec<JoinHandle<Result<(), ingestion_std::errors::StreamError>>>>,
    transmitted: Arc<Mutex<Vec<RequestUid>>>,
    forward_responses: Arc<Mutex<Vec<IngestionResponse>>>,
    bidi_responses: Arc<Mutex<Vec<IngestionResponse>>>,
    response_count: Arc<AtomicU64>,
}

impl<T: IngestionTransport + 'static> IngestionChannel<T> {
    pub fn new(transport: Arc<T>, source: Arc<StagingBuffer>, poll_timeout: Duration) -> Self {
        Self {
            transport,
            source,
            mode: Mutex::new(StreamMode::Bidirectional),
            multi_streams: Mutex::new(None),
            poll_timeout,
            active: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            transmitted: Arc::new(Mutex::new(Vec::new())),
            forward_responses: Arc::new(Mutex::new(Vec::new())),
            bidi_responses: Arc::new(Mutex::new(Vec::new())),
            response_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set_stream_type(&self, mode: StreamMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn set_stream_type_str(&self, raw: &str) -> Result<(), ChannelError> {
        let mode = StreamMode::from_str(raw).map_err(ChannelError::BadArgument)?;
        self.set_stream_type(mode);
        Ok(())
    }

    pub fn set_multiple_streams(&self, count: u32) -> Result<(), ChannelError> {
        if count == 0 {
            return Err(
                ingestion_std::errors::BadArgumentError::NonPositiveStreamCount(count as i64).into(),
            );
        }
        *self.multi_streams.lock().unwrap() = Some(count);
        Ok(())
    }

    pub fn disable_multiple_streams(&self) {
        *self.multi_streams.lock().unwrap() = None;
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawns the worker pool. The source buffer must already be active;
    /// spawning onto an inactive buffer would race every worker straight
    /// into `is_supplying() == false` before it ever took a message.
    ///
    /// Clears every accumulator left over from a prior session first, so a
    /// channel reused across repeated `openStream`/`closeStream` cycles
    /// yields an independent `IngestionResult` each time.
    pub async fn activate(&self) -> Result<(), ChannelError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(PreconditionError::ChannelAlreadyActive.into());
        }

        if !self.source.is_active() {
            self.active.store(false, Ordering::SeqCst);
            return Err(PreconditionError::BufferInactive.into());
        }

        let count = self.multi_streams.lock().unwrap().unwrap_or(1);
        let mode = *self.mode.lock().unwrap();

        self.transmitted.lock().unwrap().clear();
        self.forward_responses.lock().unwrap().clear();
        self.bidi_responses.lock().unwrap().clear();
        self.response_count.store(0, Ordering::SeqCst);

        let mut workers = self.workers.lock().unwrap();
        let mut handles = self.handles.lock().unwrap();
        workers.clear();
        handles.clear();

        for _ in 0..count {
            let sink: Arc<dyn ResponseSink> = Arc::new(ChannelSink {
                mode,
                forward_responses: self.forward_responses.clone(),
                bidi_responses: self.bidi_responses.clone(),
                response_count: self.response_count.clone(),
            });

            let worker = Arc::new(IngestionStream::new(
                self.transport.clone(),
                self.source.clone(),
                mode,
                sink,
                self.transmitted.clone(),
                self.poll_timeout,
            ));

            workers.push(worker.clone());
            handles.push(tokio::spawn(worker.run()));
        }

        Ok(())
    }

    /// Waits up to `timeout` for every worker to half-close and complete on
    /// its own; whatever hasn't finished by then is aborted.
    pub async fn shutdown(&self, timeout: Duration) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        let handles = std::mem::take(&mut *self.handles.lock().unwrap());
        if tokio::time::timeout(timeout, join_all(handles)).await.is_err() {
            warn!("channel shutdown timed out waiting for streams to drain; forcing shutdown");
            self.terminate_workers().await;
        }
    }

    /// Terminates every worker immediately and aborts its task.
    pub async fn shutdown_now(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.terminate_workers().await;
    }

    async fn terminate_workers(&self) {
        let workers = self.workers.lock().unwrap().clone();
        for worker in &workers {
            worker.terminate().await;
        }
        for handle in std::mem::take(&mut *self.handles.lock().unwrap()) {
            handle.abort();
        }
    }

    pub fn get_request_count(&self) -> u64 {
        self.transmitted.lock().unwrap().len() as u64
    }

    pub fn get_request_ids(&self) -> Vec<RequestUid> {
        self.transmitted.lock().unwrap().clone()
    }

    pub fn get_response_count(&self) -> u64 {
        self.response_count.load(Ordering::SeqCst)
    }

    pub fn get_ingestion_uni_responses(&self) -> Vec<IngestionResponse> {
        self.forward_responses.lock().unwrap().clone()
    }

    pub fn get_ingestion_bidi_responses(&self) -> Vec<IngestionResponse> {
        self.bidi_responses.lock().unwrap().clone()
    }

    /// Reconciles transmitted request uids against received responses.
    /// Bidirectional mode expects one acknowledgement per request; forward
    /// mode expects per-stream summaries whose uid sets are unioned. Either
    /// way, a transmitted uid with no matching acknowledgement becomes a
    /// `MissingResource` exception rather than silently vanishing.
    pub fn get_ingestion_result(&self) -> IngestionResult {
        let transmitted = self.transmitted.lock().unwrap().clone();
        if transmitted.is_empty() && self.response_count.load(Ordering::SeqCst) == 0 {
            return IngestionResult::null();
        }

        match *self.mode.lock().unwrap() {
            StreamMode::Bidirectional => self.bidi_result(transmitted),
            StreamMode::Forward => self.forward_result(transmitted),
        }
    }

    fn bidi_result(&self, transmitted: Vec<RequestUid>) -> IngestionResult {
        let responses = self.bidi_responses.lock().unwrap().clone();

        let mut acknowledged = Vec::new();
        let mut exceptions = Vec::new();

        for response in &responses {
            let Some(uid) = response.request_uids.first() else {
                continue;
            };
            if response.success {
                acknowledged.push(uid.clone());
            } else if let Some(exception) = &response.exception {
                exceptions.push(exception.clone());
            }
        }

        self.fill_missing(&transmitted, &acknowledged, &mut exceptions);
        IngestionResult::new(transmitted, acknowledged, exceptions)
    }

    fn forward_result(&self, transmitted: Vec<RequestUid>) -> IngestionResult {
        let responses = self.forward_responses.lock().unwrap().clone();

        let mut acknowledged = Vec::new();
        let mut exceptions = Vec::new();

        for response in &responses {
            if response.success {
                acknowledged.extend(response.request_uids.iter().cloned());
            } else if let Some(exception) = &response.exception {
                exceptions.push(exception.clone());
            }
        }

        self.fill_missing(&transmitted, &acknowledged, &mut exceptions);
        IngestionResult::new(transmitted, acknowledged, exceptions)
    }

    fn fill_missing(
        &self,
        transmitted: &[RequestUid],
        acknowledged: &[RequestUid],
        exceptions: &mut Vec<ExceptionReport>,
    ) {
        let acked: HashSet<&RequestUid> = acknowledged.iter().collect();
        for uid in transmitted {
            let already_reported = exceptions.iter().any(|e| e.request_uid.as_ref() == Some(uid));
            if !acked.contains(uid) && !already_reported {
                exceptions.push(ExceptionReport::missing_resource(uid.clone()));
            }
        }
    }
}
