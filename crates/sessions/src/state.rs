use std::fmt;

use switchboard_channels::ClientEvent;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    QrGenerated,
    Authenticated,
    Ready,
    AuthFailed,
    Disconnected,
    Timeout,
    Error,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::QrGenerated => "qr_generated",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailed => "auth_failed",
            Self::Disconnected => "disconnected",
            Self::Timeout => "timeout",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a lifecycle event does to a registered session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Record the new state.
    Enter(SessionState),
    /// Drop the registry entry; the session must be created again.
    Remove,
    /// The event is not valid from the current state.
    Ignore,
}

/// State machine for client-reported events.
///
/// `timeout` is not authoritative: any real progress event moves a timed-out
/// session forward as if it had never timed out.
pub fn transition(current: SessionState, event: &ClientEvent) -> Transition {
    use SessionState::*;

    match (event, current) {
        (ClientEvent::Disconnected { .. }, _) => Transition::Remove,
        (ClientEvent::AuthFailure { .. }, _) => Transition::Enter(AuthFailed),
        (ClientEvent::Qr { .. }, Initializing | QrGenerated | Timeout) => {
            Transition::Enter(QrGenerated)
        },
        (ClientEvent::Authenticated, Initializing | QrGenerated | Timeout) => {
            Transition::Enter(Authenticated)
        },
        (ClientEvent::Ready, Authenticated | Timeout) => Transition::Enter(Ready),
        _ => Transition::Ignore,
    }
}

/// State after the initialization deadline passes, if it changes.
pub fn on_init_deadline(current: SessionState) -> Option<SessionState> {
    (current == SessionState::Initializing).then_some(SessionState::Timeout)
}
