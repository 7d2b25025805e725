//! WhatsApp Web backend for switchboard.
//!
//! Sessions are driven through a Node.js sidecar that speaks WhatsApp Web;
//! this crate manages the sidecar process and exposes each session as a
//! [`switchboard_channels::MessagingClient`] over one shared WebSocket.

pub mod backend;
pub mod client;
pub mod process;
pub mod sidecar;
pub mod types;

pub use {
    backend::WhatsAppBackend,
    client::{SidecarClient, SidecarClientFactory},
    process::{SidecarLaunch, SidecarProcess, find_sidecar_dir, start_sidecar},
    sidecar::{DEFAULT_SIDECAR_PORT, SidecarConnection, connect_with_retry},
};
