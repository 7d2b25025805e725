//! Session naming, registry and lifecycle.
//!
//! Callers name sessions freely; names are normalized into path-safe ids,
//! registered at most once, and driven through their lifecycle by client
//! events reported to the [`SessionManager`].

pub mod error;
pub mod key;
pub mod manager;
pub mod registry;
pub mod state;
pub mod storage;

pub use {
    error::{Error, Result},
    key::{SessionId, normalize},
    manager::{ReadySession, RestoreReport, SessionManager, ShutdownReport},
    registry::{AliasTable, SessionInfo, SessionRegistry},
    state::SessionState,
    storage::SessionStorage,
};
