//! Gateway: HTTP surface over the session registry and message dispatch.
//!
//! Lifecycle:
//! 1. Resolve the auth directory and start the messaging backend
//! 2. Build the session manager, optionally restoring persisted sessions
//! 3. Serve HTTP until SIGINT/SIGTERM
//! 4. Drain every session, then stop the backend

pub mod error;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

pub use {
    error::ApiError,
    server::{build_app, serve, start_gateway},
    state::AppState,
};
