//! Media pipeline: bounded download of remote attachments with MIME detection.

pub mod error;
pub mod fetch;
pub mod mime;

pub use {
    error::{Error, Result},
    fetch::{FetchedMedia, MediaFetcher},
};
