use thiserror::Error;
use trellis_types::{ApplyError, Generation};

/// Errors from the audit log.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit log io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed audit record on line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

/// Errors from the Mutation Pipeline.
///
/// `StaleGeneration` is the optimistic-concurrency contract: the caller must
/// resubmit against the generation reported in `current`. Nothing is
/// recorded for a stale or malformed submission — it never entered the
/// pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stale base generation {submitted}, current generation is {current}")]
    StaleGeneration {
        submitted: Generation,
        current: Generation,
    },

    #[error("mutation could not be applied: {0}")]
    Apply(#[from] ApplyError),

    #[error("audit log error: {0}")]
    Audit(#[from] AuditError),

    #[error("audit log replay failed at generation {generation}: {source}")]
    Replay {
        generation: Generation,
        source: ApplyError,
    },
}
