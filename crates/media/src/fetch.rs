//! Bounded HTTP download of message attachments.

use std::time::Duration;

use {
    bytes::{Bytes, BytesMut},
    futures::StreamExt,
    switchboard_config::MediaConfig,
    tracing::{debug, info},
    url::Url,
};

use crate::{
    error::{Error, Result},
    mime::{filename_from_url, resolve_mime},
};

/// A downloaded attachment.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub data: Bytes,
    pub mime_type: String,
    pub filename: Option<String>,
}

/// Downloads media with a size cap and an overall deadline.
#[derive(Debug, Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    max_bytes: u64,
    timeout: Duration,
}

impl MediaFetcher {
    pub fn new(max_bytes: u64, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("switchboard/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_bytes,
            timeout,
        })
    }

    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        Self::new(
            config.max_bytes,
            Duration::from_secs(config.fetch_timeout_secs),
        )
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Download `raw_url`.
    ///
    /// Fails on non-http(s) URLs, non-2xx responses, timeouts, and bodies
    /// over the size limit (checked against `Content-Length` up front and
    /// again while streaming).
    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedMedia> {
        let url = Url::parse(raw_url).map_err(|source| Error::InvalidUrl {
            url: raw_url.to_string(),
            source,
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }

        debug!(url = %url, "fetching media");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(len) = response.content_length()
            && len > self.max_bytes
        {
            return Err(Error::TooLarge {
                limit: self.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(e))?;
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(Error::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        let filename = filename_from_url(&url);
        let mime_type = resolve_mime(content_type.as_deref(), filename.as_deref());
        info!(
            url = %url,
            bytes = body.len(),
            mime_type = %mime_type,
            "media fetched"
        );

        Ok(FetchedMedia {
            data: body.freeze(),
            mime_type,
            filename,
        })
    }

    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            Error::Request(err)
        }
    }
}
