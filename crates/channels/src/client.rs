use std::{path::PathBuf, sync::Arc};

use {async_trait::async_trait, bytes::Bytes, tokio::sync::mpsc, tracing::debug};

use crate::Result;

// ── Lifecycle events ────────────────────────────────────────────────────────

/// Lifecycle notifications a messaging client reports for its session.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A pairing code is available; may repeat until it is scanned.
    Qr { code: String },
    /// Credentials were accepted.
    Authenticated,
    /// The session is fully operational.
    Ready,
    /// Credentials were rejected.
    AuthFailure { reason: String },
    /// The link to the network was lost.
    Disconnected { reason: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Qr { .. } => "qr",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::AuthFailure { .. } => "auth_failure",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

/// A [`ClientEvent`] tagged with the session and handle generation it came from.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: String,
    pub generation: u64,
    pub event: ClientEvent,
}

/// Create the channel that carries [`SessionEvent`]s back to the core.
pub fn event_channel() -> (
    mpsc::UnboundedSender<SessionEvent>,
    mpsc::UnboundedReceiver<SessionEvent>,
) {
    mpsc::unbounded_channel()
}

/// Per-handle sender: stamps every event with its session id and generation.
#[derive(Debug, Clone)]
pub struct ClientEventSender {
    session_id: String,
    generation: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ClientEventSender {
    pub fn new(
        session_id: impl Into<String>,
        generation: u64,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            generation,
            tx,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Push an event. Returns `false` once the receiving side is gone.
    pub fn emit(&self, event: ClientEvent) -> bool {
        let delivered = self
            .tx
            .send(SessionEvent {
                session_id: self.session_id.clone(),
                generation: self.generation,
                event,
            })
            .is_ok();
        if !delivered {
            debug!(session_id = %self.session_id, "event receiver dropped");
        }
        delivered
    }
}

// ── Outbound payloads ───────────────────────────────────────────────────────

/// How a media attachment should be presented by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Document,
    /// Audio delivered as a push-to-talk voice note.
    Voice,
    Video,
}

/// Downloaded media ready to hand to the client.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub kind: MediaKind,
    pub data: Bytes,
    pub mime_type: String,
    pub filename: Option<String>,
    pub caption: Option<String>,
}

/// A single outbound message.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    Text { body: String, link_preview: bool },
    Media(MediaAttachment),
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text {
            body: body.into(),
            link_preview: false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Media(m) => match m.kind {
                MediaKind::Image => "image",
                MediaKind::Document => "document",
                MediaKind::Voice => "voice",
                MediaKind::Video => "video",
            },
        }
    }
}

/// Acknowledgement returned by a successful send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: Option<String>,
}

// ── Client traits ───────────────────────────────────────────────────────────

/// A live or pending connection to the messaging network for one session.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start connecting. Progress is reported through the handle's
    /// [`ClientEventSender`]; this resolves once the attempt has been issued
    /// or has failed outright.
    async fn initialize(&self) -> Result<()>;

    /// Invalidate the stored credentials without tearing the handle down.
    async fn logout(&self) -> Result<()>;

    /// Release every resource held by the handle.
    async fn destroy(&self) -> Result<()>;

    /// Whether `address` belongs to an account on the network.
    async fn is_registered(&self, address: &str) -> Result<bool>;

    /// Deliver `message` to `to`.
    async fn send(&self, to: &str, message: OutboundMessage) -> Result<SentMessage>;
}

/// Everything a factory needs to build one client handle.
#[derive(Debug, Clone)]
pub struct ClientSpec {
    pub session_id: String,
    /// Directory the client persists its auth material in.
    pub storage_path: PathBuf,
    pub events: ClientEventSender,
}

/// Builds client handles. Construction must be cheap and must not block:
/// it runs while the session registry is locked.
pub trait ClientFactory: Send + Sync {
    fn create(&self, spec: ClientSpec) -> Result<Arc<dyn MessagingClient>>;
}
