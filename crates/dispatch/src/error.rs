/// Errors from routing a message to the network.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] switchboard_sessions::Error),

    #[error("invalid phone number {input:?}: expected at least {min_digits} digits")]
    InvalidPhone { input: String, min_digits: usize },

    #[error("{address} is not registered on the messaging network")]
    Unregistered { address: String },

    #[error("unsupported message type: {kind}")]
    UnsupportedType { kind: String },

    #[error("missing required field {field:?} for {kind} message")]
    MissingField { field: &'static str, kind: String },

    #[error("failed to fetch media: {0}")]
    Fetch(#[from] switchboard_media::Error),

    #[error(transparent)]
    Client(#[from] switchboard_channels::Error),
}

impl Error {
    #[must_use]
    pub fn missing_field(field: &'static str, kind: impl Into<String>) -> Self {
        Self::MissingField {
            field,
            kind: kind.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
