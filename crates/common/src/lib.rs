//! Small utilities shared across switchboard crates.

pub mod error;
pub mod time;

pub use error::FromMessage;
