use thiserror::Error;

pub type Result<T, E = IngestionError> = std::result::Result<T, E>;

/// Invoking an operation in the wrong lifecycle phase (inactive, not-open,
/// already-active).
#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error("FrameProcessor is not active; call activate() first")]
    ProcessorInactive,

    #[error("StagingBuffer is not active; call activate() first")]
    BufferInactive,

    #[error("IngestionChannel is already active")]
    ChannelAlreadyActive,

    #[error("IngestionChannel is not active")]
    ChannelInactive,

    #[error("stream is not open; call openStream() first")]
    StreamNotOpen,

    #[error("stream is already open")]
    StreamAlreadyOpen,
}

/// Zero/negative counts, unsupported stream type, and other invalid
/// caller-supplied arguments.
#[derive(Error, Debug)]
pub enum BadArgumentError {
    #[error("stream concurrency must be a positive count, got {0}")]
    NonPositiveStreamCount(i64),

    #[error("concurrency thread count must be a positive count, got {0}")]
    NonPositiveThreadCount(i64),

    #[error("unsupported stream type: {0}")]
    UnsupportedStreamType(String),

    #[error("decomposition max size must be greater than zero")]
    NonPositiveMaxSize,

    #[error("buffer capacity must be greater than zero")]
    NonPositiveCapacity,
}

/// Per-frame, non-fatal: a frame could not be split to fit the configured
/// bound and was emitted unsplit.
#[derive(Error, Debug, Clone)]
#[error("frame could not be decomposed under max size {max_bytes} bytes; emitted unsplit ({actual_bytes} bytes)")]
pub struct DecompositionFailure {
    pub max_bytes: u64,
    pub actual_bytes: u64,
}

/// Per-frame, non-fatal: a frame could not be serialized into a WireMessage.
#[derive(Error, Debug)]
#[error("failed to convert frame to wire message: {message}")]
pub struct ConversionFailure {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// RPC runtime error surfaced by the abstracted transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to open stream: {0}")]
    OpenFailed(String),

    #[error("failed to send message on stream: {0}")]
    SendFailed(String),

    #[error("failed to half-close stream: {0}")]
    HalfCloseFailed(String),

    #[error("stream terminated with error: {0}")]
    StreamError(String),

    #[error("provider registration failed: {0}")]
    RegistrationFailed(String),
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    BadArgument(#[from] BadArgumentError),

    #[error("cannot submit frame: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("frame serialization failed")]
    Conversion(#[source] Box<ConversionFailure>),
}

#[derive(Error, Debug)]
pub enum BufferError {
    #[error(transparent)]
    BadArgument(#[from] BadArgumentError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("wait was interrupted before completion")]
    Interrupted,
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("stream was externally terminated")]
    Terminated,

    #[error("response sink raised an error: {0}")]
    SinkError(String),
}

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error(transparent)]
    BadArgument(#[from] BadArgumentError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("response could not be mapped to a transmitted request: {0}")]
    MissingResource(String),
}

/// Error in the background transfer task (FrameProcessor -> StagingBuffer
/// coupling). Aggravating: detected at closeStream, triggers hard-shutdown.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    BadArgument(#[from] BadArgumentError),

    #[error("provider registration failed: {0}")]
    RegistrationFailed(#[source] TransportError),

    #[error("ingestion failed: {0}")]
    Ingestion(#[from] FrameError),

    #[error("wait was interrupted before completion")]
    Interrupted,

    #[error("transfer task failed, session aborted: {0}")]
    Completion(#[from] TransferError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("result could not be assembled: {0}")]
    MissingResource(String),
}

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Buffer(#[from] BufferError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
