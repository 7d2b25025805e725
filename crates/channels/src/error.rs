/// Crate-wide result type for messaging client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed client errors shared by every messaging backend.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid client input: {message}")]
    InvalidInput { message: String },

    /// The backend is not reachable or not in a usable state.
    #[error("messaging client unavailable: {message}")]
    Unavailable { message: String },

    /// The backend answered but refused the request.
    #[error("messaging client rejected request: {message}")]
    Rejected { message: String },

    /// The backend did not answer in time.
    #[error("messaging client timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn rejected(message: impl std::fmt::Display) -> Self {
        Self::Rejected {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }
}
