use crate::ids::RequestUid;

/// A human-readable, tagged exceptional outcome attached to a response or
/// surfaced by result-construction when a request could not be accounted
/// for.
#[derive(Debug, Clone)]
pub struct ExceptionReport {
    pub request_uid: Option<RequestUid>,
    pub kind: String,
    pub message: String,
}

impl ExceptionReport {
    pub fn new(request_uid: Option<RequestUid>, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_uid,
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn missing_resource(request_uid: RequestUid) -> Self {
        Self::new(
            Some(request_uid),
            "MissingResource",
            "transmitted request was never acknowledged",
        )
    }
}

/// Per-request acknowledgement (bidirectional mode) or per-stream terminal
/// report (unidirectional mode).
#[derive(Debug, Clone)]
pub struct IngestionResponse {
    /// The request uid (bidirectional: exactly one) or the full list of
    /// uids this response summarizes (unidirectional: the per-stream
    /// terminal report).
    pub request_uids: Vec<RequestUid>,
    pub success: bool,
    pub exception: Option<ExceptionReport>,
}

impl IngestionResponse {
    pub fn ack(request_uid: RequestUid) -> Self {
        Self {
            request_uids: vec![request_uid],
            success: true,
            exception: None,
        }
    }

    pub fn reject(request_uid: RequestUid, exception: ExceptionReport) -> Self {
        Self {
            request_uids: vec![request_uid],
            success: false,
            exception: Some(exception),
        }
    }

    pub fn summary(request_uids: Vec<RequestUid>) -> Self {
        Self {
            request_uids,
            success: true,
            exception: None,
        }
    }
}

/// Aggregated terminal outcome of an ingestion session.
#[derive(Debug, Clone)]
pub struct IngestionResult {
    pub requests_transmitted: Vec<RequestUid>,
    pub requests_acknowledged: Vec<RequestUid>,
    pub exceptions: Vec<ExceptionReport>,
    is_null: bool,
}

impl IngestionResult {
    pub fn new(
        requests_transmitted: Vec<RequestUid>,
        requests_acknowledged: Vec<RequestUid>,
        exceptions: Vec<ExceptionReport>,
    ) -> Self {
        Self {
            requests_transmitted,
            requests_acknowledged,
            exceptions,
            is_null: false,
        }
    }

    /// Sentinel instance for "no result yet available."
    pub fn null() -> Self {
        Self {
            requests_transmitted: Vec::new(),
            requests_acknowledged: Vec::new(),
            exceptions: Vec::new(),
            is_null: true,
        }
    }

    pub fn is_null(&self) -> bool {
        self.is_null
    }

    pub fn has_exception(&self) -> bool {
        !self.exceptions.is_empty()
    }
}
