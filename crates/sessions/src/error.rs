use std::path::PathBuf;

use crate::{key::SessionId, state::SessionState};

/// Errors from session registry and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid session name: {message}")]
    InvalidName { message: String },

    #[error("session not found: {name}")]
    NotFound { name: String },

    #[error("session already exists: {id}")]
    AlreadyExists { id: SessionId },

    #[error("session {id} is not ready (current state: {state})")]
    NotReady { id: SessionId, state: SessionState },

    #[error("gateway is shutting down, new sessions are not accepted")]
    ShuttingDown,

    #[error("messaging client error for session {id}: {source}")]
    Client {
        id: SessionId,
        #[source]
        source: switchboard_channels::Error,
    },

    #[error("session storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    #[must_use]
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
