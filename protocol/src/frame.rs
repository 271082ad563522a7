use std::fmt;

use bytes::Bytes;

use crate::ids::{ProviderUid, RequestUid};
use ingestion_std::errors::ConversionFailure;

/// A producer-supplied tabular batch: a set of named columns, a time domain,
/// and metadata. The pipeline treats it as an opaque value exposing only its
/// total serialized allocation and a decomposition operator.
pub trait IngestionFrame: Send + Sync + fmt::Debug {
    /// Predicted serialized size in bytes, used both to decide whether
    /// decomposition is required and to bound each resulting sub-frame.
    fn serialized_allocation(&self) -> u64;

    /// Number of rows/samples along the time axis; the axis decomposition
    /// bisects along.
    fn sample_count(&self) -> usize;

    /// Producer-assigned request uid, if any.
    fn request_uid(&self) -> Option<&str>;

    /// Splits the frame at `sample_index` into two sub-frames covering
    /// `[0, sample_index)` and `[sample_index, sample_count)` respectively.
    /// Columns stay intact; only the sample axis is partitioned.
    fn split_at(&self, sample_index: usize) -> (Box<dyn IngestionFrame>, Box<dyn IngestionFrame>);

    /// Serializes the frame's payload for transmission. Failure here is
    /// non-fatal at the FrameProcessor level: the frame is dropped and the
    /// failure recorded in `failedConversions`.
    fn serialize(&self) -> Result<Bytes, ConversionFailure>;
}

/// One sub-frame produced by decomposition, paired with its position within
/// the parent's decomposition (1-based, in original temporal order).
pub struct DecomposedFrame {
    pub index: usize,
    pub frame: Box<dyn IngestionFrame>,
}

/// Splits `frame` into sub-frames whose predicted serialized size is each
/// `<= max_bytes`, bisecting along the sample axis and recursing. Returns the
/// ordered sub-frames plus any decomposition failures encountered (a leaf
/// whose single sample still exceeds `max_bytes` is emitted unsplit).
///
/// When the frame already fits, this returns a single "sub-frame" equal to
/// the input with `index` absent (the caller is expected to treat a
/// single-element result as "not decomposed").
pub fn decompose(
    frame: Box<dyn IngestionFrame>,
    max_bytes: u64,
) -> (Vec<Box<dyn IngestionFrame>>, Vec<ingestion_std::errors::DecompositionFailure>) {
    let mut out = Vec::new();
    let mut failures = Vec::new();
    decompose_rec(frame, max_bytes, &mut out, &mut failures);
    (out, failures)
}

fn decompose_rec(
    frame: Box<dyn IngestionFrame>,
    max_bytes: u64,
    out: &mut Vec<Box<dyn IngestionFrame>>,
    failures: &mut Vec<ingestion_std::errors::DecompositionFailure>,
) {
    let allocation = frame.serialized_allocation();

    if allocation <= max_bytes {
        out.push(frame);
        return;
    }

    if frame.sample_count() <= 1 {
        failures.push(ingestion_std::errors::DecompositionFailure {
            max_bytes,
            actual_bytes: allocation,
        });
        out.push(frame);
        return;
    }

    // Bisect off a prefix sized to fit under max_bytes (estimated from the
    // frame's average per-sample allocation) and recurse on the remainder.
    // This keeps sub-frames close to the size bound instead of halving
    // repeatedly, and preserves temporal order since the prefix always
    // precedes the remainder.
    let bytes_per_sample = allocation as f64 / frame.sample_count() as f64;
    let split_at = ((max_bytes as f64 / bytes_per_sample).floor() as usize)
        .clamp(1, frame.sample_count() - 1);

    let (left, right) = frame.split_at(split_at);
    decompose_rec(left, max_bytes, out, failures);
    decompose_rec(right, max_bytes, out, failures);
}

/// The serialized unit transmitted to the remote service.
#[derive(Debug, Clone)]
pub struct WireMessage {
    pub provider_uid: ProviderUid,
    pub request_uid: RequestUid,
    pub payload: Bytes,
    /// 1-based position within the parent frame's decomposition, or `None`
    /// when the frame was not decomposed.
    pub sequence: Option<u32>,
}

impl WireMessage {
    pub fn new(provider_uid: ProviderUid, request_uid: RequestUid, payload: Bytes) -> Self {
        Self {
            provider_uid,
            request_uid,
            payload,
            sequence: None,
        }
    }

    pub fn serialized_size(&self) -> u64 {
        self.payload.len() as u64
    }
}
