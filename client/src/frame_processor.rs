use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ingestion_protocol::{decompose, IngestionFrame, ProviderUid, RequestUid, WireMessage};
use ingestion_std::errors::{ConversionFailure, DecompositionFailure, FrameError, PreconditionError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type BoxedFrame = Box<dyn IngestionFrame>;

type Chan<T> = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<T>>>;

/// Decomposes oversized frames and converts them into wire messages, tagging
/// each with a unique request identifier. Decomposition and conversion run
/// as two disjoint worker pools of equal size; output order across workers
/// is not preserved, but sub-messages of one input frame retain their
/// original temporal order because each frame's decomposition happens
/// within a single worker iteration before its pieces are fanned out.
///
/// Every channel is re-seated on `activate()`, so the processor can be
/// reused across repeated `openStream`/`closeStream` sessions.
pub struct FrameProcessor {
    provider: Mutex<Option<ProviderUid>>,
    decompose_max_bytes: Mutex<Option<u64>>,
    concurrency: Mutex<Option<u32>>,
    active: AtomicBool,
    pending: Arc<AtomicI64>,
    input_tx: Mutex<Option<mpsc::UnboundedSender<(BoxedFrame, RequestUid)>>>,
    decompose_rx: Mutex<Chan<(BoxedFrame, RequestUid)>>,
    convert_tx: Mutex<mpsc::UnboundedSender<(BoxedFrame, RequestUid)>>,
    convert_rx: Mutex<Chan<(BoxedFrame, RequestUid)>>,
    output_tx: Mutex<mpsc::UnboundedSender<WireMessage>>,
    output_rx: Mutex<Chan<WireMessage>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    failed_decompositions: Arc<Mutex<Vec<DecompositionFailure>>>,
    failed_conversions: Arc<Mutex<Vec<ConversionFailure>>>,
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameProcessor {
    pub fn new() -> Self {
        let (input_tx, decompose_rx) = mpsc::unbounded_channel();
        let (convert_tx, convert_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        Self {
            provider: Mutex::new(None),
            decompose_max_bytes: Mutex::new(Some(4 * 1024 * 1024)),
            concurrency: Mutex::new(None),
            active: AtomicBool::new(false),
            pending: Arc::new(AtomicI64::new(0)),
            input_tx: Mutex::new(Some(input_tx)),
            decompose_rx: Mutex::new(Arc::new(tokio::sync::Mutex::new(decompose_rx))),
            convert_tx: Mutex::new(convert_tx),
            convert_rx: Mutex::new(Arc::new(tokio::sync::Mutex::new(convert_rx))),
            output_tx: Mutex::new(output_tx),
            output_rx: Mutex::new(Arc::new(tokio::sync::Mutex::new(output_rx))),
            worker_handles: Mutex::new(Vec::new()),
            failed_decompositions: Arc::new(Mutex::new(Vec::new())),
            failed_conversions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_provider(&self, provider: ProviderUid) {
        *self.provider.lock().unwrap() = Some(provider);
    }

    pub fn set_frame_decomposition(&self, max_bytes: u64) {
        *self.decompose_max_bytes.lock().unwrap() = Some(max_bytes);
    }

    pub fn disable_frame_decomposition(&self) {
        *self.decompose_max_bytes.lock().unwrap() = None;
    }

    pub fn set_concurrency(&self, n: u32) {
        *self.concurrency.lock().unwrap() = Some(n.max(1));
    }

    pub fn disable_concurrency(&self) {
        *self.concurrency.lock().unwrap() = None;
    }

    /// Spawns the decomposition and conversion worker pools. The provider
    /// uid must already be set. Re-seats every internal channel and retires
    /// any workers left over from a prior session, so the processor can be
    /// shut down and reactivated for a new `openStream`/`closeStream` cycle.
    pub fn activate(&self) -> Result<(), FrameError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if self.provider.lock().unwrap().is_none() {
            self.active.store(false, Ordering::SeqCst);
            return Err(PreconditionError::ProcessorInactive.into());
        }

        for handle in self.worker_handles.lock().unwrap().drain(..) {
            handle.abort();
        }

        let (input_tx, decompose_rx) = mpsc::unbounded_channel();
        let (convert_tx, convert_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        *self.input_tx.lock().unwrap() = Some(input_tx);
        *self.decompose_rx.lock().unwrap() = Arc::new(tokio::sync::Mutex::new(decompose_rx));
        *self.convert_tx.lock().unwrap() = convert_tx;
        *self.convert_rx.lock().unwrap() = Arc::new(tokio::sync::Mutex::new(convert_rx));
        *self.output_tx.lock().unwrap() = output_tx;
        *self.output_rx.lock().unwrap() = Arc::new(tokio::sync::Mutex::new(output_rx));
        self.pending.store(0, Ordering::SeqCst);

        let worker_count = self.concurrency.lock().unwrap().unwrap_or(1);
        let max_bytes = *self.decompose_max_bytes.lock().unwrap();

        let mut handles = self.worker_handles.lock().unwrap();

        for _ in 0..worker_count {
            handles.push(tokio::spawn(decompose_worker(
                self.decompose_rx.lock().unwrap().clone(),
                max_bytes,
                self.convert_tx.lock().unwrap().clone(),
                self.pending.clone(),
                self.failed_decompositions.clone(),
            )));
        }

        let provider = self.provider.lock().unwrap().clone().unwrap();
        for _ in 0..worker_count {
            handles.push(tokio::spawn(convert_worker(
                self.convert_rx.lock().unwrap().clone(),
                self.output_tx.lock().unwrap().clone(),
                provider.clone(),
                self.pending.clone(),
                self.failed_conversions.clone(),
            )));
        }

        Ok(())
    }

    /// Stops accepting new frames; existing queued work keeps draining.
    pub fn shutdown(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.input_tx.lock().unwrap().take();
    }

    /// Stops accepting new frames and abandons in-flight work immediately.
    pub fn shutdown_now(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.input_tx.lock().unwrap().take();

        for handle in self.worker_handles.lock().unwrap().drain(..) {
            handle.abort();
        }

        self.pending.store(0, Ordering::SeqCst);
    }

    pub fn submit(&self, frame: BoxedFrame) -> Result<(), FrameError> {
        if !self.active.load(Ordering::SeqCst) {
            return Err(PreconditionError::ProcessorInactive.into());
        }

        let guard = self.input_tx.lock().unwrap();
        let tx = guard.as_ref().ok_or(PreconditionError::ProcessorInactive)?;

        let uid = frame
            .request_uid()
            .map(RequestUid::new)
            .unwrap_or_else(RequestUid::generate);

        self.pending.fetch_add(1, Ordering::SeqCst);
        if tx.send((frame, uid)).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            debug!("frame processor input channel closed during submit");
        }

        Ok(())
    }

    pub fn submit_all(&self, frames: Vec<BoxedFrame>) -> Result<(), FrameError> {
        for frame in frames {
            self.submit(frame)?;
        }
        Ok(())
    }

    /// True while active, or while output backlog remains.
    pub fn is_supplying(&self) -> bool {
        self.active.load(Ordering::SeqCst) || self.pending.load(Ordering::SeqCst) > 0
    }

    pub async fn take(&self) -> Option<WireMessage> {
        let output_rx = self.output_rx.lock().unwrap().clone();
        let msg = output_rx.lock().await.recv().await;
        if msg.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        msg
    }

    pub fn poll(&self) -> Option<WireMessage> {
        let output_rx = self.output_rx.lock().unwrap().clone();
        let mut guard = match output_rx.try_lock() {
            Ok(guard) => guard,
            Err(_) => return None,
        };
        let msg = guard.try_recv().ok();
        if msg.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        msg
    }

    pub async fn poll_timeout(&self, timeout: Duration) -> Option<WireMessage> {
        let output_rx = self.output_rx.lock().unwrap().clone();
        let mut guard = output_rx.lock().await;
        match tokio::time::timeout(timeout, guard.recv()).await {
            Ok(Some(msg)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                Some(msg)
            }
            Ok(None) | Err(_) => None,
        }
    }

    pub fn failed_decompositions(&self) -> Vec<DecompositionFailure> {
        self.failed_decompositions.lock().unwrap().clone()
    }

    pub fn failed_conversions(&self) -> Vec<String> {
        self.failed_conversions
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.message.clone())
            .collect()
    }
}

async fn decompose_worker(
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<(BoxedFrame, RequestUid)>>>,
    max_bytes: Option<u64>,
    convert_tx: mpsc::UnboundedSender<(BoxedFrame, RequestUid)>,
    pending: Arc<AtomicI64>,
    failed: Arc<Mutex<Vec<DecompositionFailure>>>,
) {
    loop {
        let item = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        let (frame, uid) = match item {
            Some(item) => item,
            None => break,
        };

        let Some(max_bytes) = max_bytes else {
            let _ = convert_tx.send((frame, uid));
            continue;
        };

        if frame.serialized_allocation() <= max_bytes {
            let _ = convert_tx.send((frame, uid));
            continue;
        }

        let (pieces, failures) = decompose(frame, max_bytes);
        if !failures.is_empty() {
            warn!(count = failures.len(), "frame could not be fully decomposed under max size");
            failed.lock().unwrap().extend(failures);
        }

        let piece_count = pieces.len();
        pending.fetch_add(piece_count as i64 - 1, Ordering::SeqCst);

        for (index, piece) in pieces.into_iter().enumerate() {
            let piece_uid = if piece_count > 1 {
                uid.child(index + 1)
            } else {
                uid.clone()
            };

            if convert_tx.send((piece, piece_uid)).is_err() {
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

async fn convert_worker(
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<(BoxedFrame, RequestUid)>>>,
    output_tx: mpsc::UnboundedSender<WireMessage>,
    provider: ProviderUid,
    pending: Arc<AtomicI64>,
    failed: Arc<Mutex<Vec<ConversionFailure>>>,
) {
    loop {
        let item = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        let (frame, uid) = match item {
            Some(item) => item,
            None => break,
        };

        match frame.serialize() {
            Ok(payload) => {
                let message = WireMessage::new(provider.clone(), uid, payload);
                if output_tx.send(message).is_err() {
                    pending.fetch_sub(1, Ordering::SeqCst);
                }
            }
            Err(failure) => {
                warn!(error = %failure, "dropping frame that failed to serialize");
                failed.lock().unwrap().push(failure);
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}
