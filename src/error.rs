use std::error::Error;
use std::fmt;

/// Error kinds the digestion core distinguishes.
///
/// Every variant is fatal for the record or run that raised it: the pipeline
/// has no retry or partial-success mode, so these propagate straight up
/// through `anyhow` and abort the stream. Callers that need to branch on the
/// kind can downcast with `err.downcast_ref::<PorecError>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PorecError {
    /// Enzyme name not present in the registry. Raised before any scanning.
    UnknownEnzyme(String),
    /// Sequence/quality length mismatch, or a split offset outside
    /// `0..=seq.len()`, or a record missing a field its consumer requires.
    MalformedRecord(String),
    /// During re-indexing, the number of deltas emitted for a modification
    /// key did not equal the number of probabilities selected for it.
    ModificationEncodingMismatch {
        record: String,
        deltas: usize,
        probs: usize,
    },
    /// A grouping stage received a record for an already-closed parent group.
    OrderingViolation { parent: String },
    /// An output path requiring quality-scored text was asked to serialize a
    /// record with no quality data.
    MissingQuality(String),
}

impl fmt::Display for PorecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PorecError::UnknownEnzyme(name) => {
                write!(f, "unknown enzyme: {name}")
            }
            PorecError::MalformedRecord(msg) => {
                write!(f, "malformed record: {msg}")
            }
            PorecError::ModificationEncodingMismatch {
                record,
                deltas,
                probs,
            } => write!(
                f,
                "modification encoding mismatch in {record}: \
                 {deltas} deltas vs {probs} probabilities"
            ),
            PorecError::OrderingViolation { parent } => write!(
                f,
                "ordering violation: record for already-closed group {parent}"
            ),
            PorecError::MissingQuality(name) => {
                write!(f, "no quality data, can't write fastq for {name}")
            }
        }
    }
}

impl Error for PorecError {}
