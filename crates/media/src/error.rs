#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid media url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported media url scheme {scheme:?}, expected http or https")]
    UnsupportedScheme { scheme: String },

    #[error("media download failed with HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("media exceeds the {limit}-byte limit")]
    TooLarge { limit: u64 },

    #[error("media download timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("media download failed: {0}")]
    Request(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
