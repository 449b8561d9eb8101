use thiserror::Error;

pub type WireResult<T> = Result<T, WireError>;

/// Engine-level error taxonomy. Every fallible boundary call returns one of
/// these rather than unwinding; the HTTP layer maps each variant to a status
/// code (see `wireline-api::error`).
#[derive(Error, Debug)]
pub enum WireError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("transient dependency error: {0}")]
    TransientDependency(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl WireError {
    /// Whether retrying the operation that produced this error is expected
    /// to eventually succeed (used by the job substrate's retry policy).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WireError::TransientDependency(_) | WireError::ProviderError(_)
        )
    }
}
