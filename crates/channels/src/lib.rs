//! Seam between the gateway core and an external messaging client.
//!
//! A messaging backend implements [`ClientFactory`] and [`MessagingClient`].
//! The core owns every client handle it creates and learns about lifecycle
//! progress (pairing codes, authentication, link loss) through
//! [`ClientEvent`]s pushed into a [`ClientEventSender`].

pub mod client;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use {
    client::{
        ClientEvent, ClientEventSender, ClientFactory, ClientSpec, MediaAttachment, MediaKind,
        MessagingClient, OutboundMessage, SentMessage, SessionEvent, event_channel,
    },
    error::{Error, Result},
};
