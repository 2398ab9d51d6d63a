use crate::algorithms::evaluator::Tag;

/// Errors raised by the simplex engine and its collaborators
///
/// Every variant is fatal for the run it occurs in. Boundary clamping and the shrink
/// fallback are regular branches of the algorithm and never produce an error.
#[derive(Debug, thiserror::Error)]
pub enum SimplexError {
    /// The problem or the run configuration cannot be iterated on
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A meta-parameter was requested that has never been set
    #[error("unknown meta-parameter: {0}")]
    UnknownKey(String),

    /// The cost function could not produce a value
    #[error("cost function evaluation failed at {point:?}: {reason}")]
    Evaluation { point: Vec<f64>, reason: String },

    /// A stored checkpoint exists but could not be read back
    #[error("checkpoint could not be restored: {0}")]
    Checkpoint(String),

    /// No response arrived for a dispatched evaluation in time
    #[error("timed out after {timeout_ms} ms waiting for {tag}")]
    WorkerTimeout { tag: Tag, timeout_ms: u128 },

    /// A worker hung up before answering
    #[error("worker {0} disconnected")]
    WorkerDisconnected(usize),

    /// A worker answered with a message the coordinator cannot use
    #[error("unexpected message for {tag}: {detail}")]
    UnexpectedMessage { tag: Tag, detail: String },
}

impl SimplexError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SimplexError::InvalidConfiguration(msg.into())
    }
}
