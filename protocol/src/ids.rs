use std::fmt;

use uuid::Uuid;

/// Opaque identifier issued by the remote service's registration step.
/// Constant for the lifetime of a single open session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderUid(String);

impl ProviderUid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque unique identifier of a WireMessage within a session.
///
/// Decomposed children of one input frame reuse the parent's `RequestUid`
/// with a `#<k>` suffix (see `child`); a frame that is not decomposed keeps
/// its uid verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestUid(String);

impl RequestUid {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier, used when the producer did not supply
    /// one on the originating frame.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Derives the identifier of the `index`-th (1-based) sub-frame produced
    /// by decomposing the frame this uid belongs to.
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}#{}", self.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RequestUid {
    fn from(id: String) -> Self {
        Self(id)
    }
}
