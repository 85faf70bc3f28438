use thiserror::Error;

/// Core error kinds, per spec.md §7. Propagation policy is documented at
/// each call site rather than here: some variants are surfaced to callers,
/// others are recovered locally (mapped to `None`/`null`/empty results) by
/// the service that produces them.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("operation timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("conflict aborted after {attempts} attempts: {reason}")]
    ConflictAborted { attempts: u32, reason: String },

    #[error("focus decision failed: {0}")]
    FocusDecisionFailed(String),
}
