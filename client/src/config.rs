use std::time::Duration;

use ingestion_protocol::StreamMode;
use ingestion_std::errors::BadArgumentError;

/// Recognized configuration keys of the ingestion client. All options have
/// defaults; none of this loads a config file (that remains an external
/// concern) — it is a plain, validated settings struct.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// `stream.type`
    pub stream_type: StreamMode,
    /// `stream.concurrency.enabled` / `stream.concurrency.maxStreams`
    pub stream_concurrency: Option<u32>,
    /// `stream.buffer.backPressure`
    pub buffer_back_pressure: bool,
    /// buffer capacity in bytes, derived from `buffer.size x binning.maxSize`
    /// when unset
    pub buffer_capacity_bytes: u64,
    /// `decompose.active` / `decompose.maxSize`
    pub decompose_max_bytes: Option<u64>,
    /// `concurrency.active` / `concurrency.threadCount`
    pub processing_concurrency: Option<u32>,
    /// `timeout.limit` + `timeout.unit`, collapsed to a single `Duration`
    pub shutdown_timeout: Duration,
    /// `logging.enabled` / `logging.level`
    pub logging_enabled: bool,
    /// whether `Orchestrator::ingest` itself awaits buffer readiness before
    /// submitting to the FrameProcessor
    pub orchestrator_back_pressure: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            stream_type: StreamMode::Bidirectional,
            stream_concurrency: None,
            buffer_back_pressure: true,
            buffer_capacity_bytes: 64 * 1024 * 1024,
            decompose_max_bytes: Some(4 * 1024 * 1024),
            processing_concurrency: None,
            shutdown_timeout: Duration::from_secs(30),
            logging_enabled: true,
            orchestrator_back_pressure: true,
        }
    }
}

impl IngestionConfig {
    pub fn with_stream_type(mut self, stream_type: StreamMode) -> Self {
        self.stream_type = stream_type;
        self
    }

    pub fn with_stream_concurrency(mut self, streams: u32) -> Result<Self, BadArgumentError> {
        if streams == 0 {
            return Err(BadArgumentError::NonPositiveStreamCount(streams as i64));
        }
        self.stream_concurrency = Some(streams);
        Ok(self)
    }

    pub fn without_stream_concurrency(mut self) -> Self {
        self.stream_concurrency = None;
        self
    }

    pub fn with_buffer_capacity(mut self, bytes: u64) -> Result<Self, BadArgumentError> {
        if bytes == 0 {
            return Err(BadArgumentError::NonPositiveCapacity);
        }
        self.buffer_capacity_bytes = bytes;
        Ok(self)
    }

    pub fn with_decompose_max_bytes(mut self, max_bytes: u64) -> Result<Self, BadArgumentError> {
        if max_bytes == 0 {
            return Err(BadArgumentError::NonPositiveMaxSize);
        }
        self.decompose_max_bytes = Some(max_bytes);
        Ok(self)
    }

    pub fn without_decomposition(mut self) -> Self {
        self.decompose_max_bytes = None;
        self
    }

    pub fn with_processing_concurrency(mut self, threads: u32) -> Result<Self, BadArgumentError> {
        if threads == 0 {
            return Err(BadArgumentError::NonPositiveThreadCount(threads as i64));
        }
        self.processing_concurrency = Some(threads);
        Ok(self)
    }
}
