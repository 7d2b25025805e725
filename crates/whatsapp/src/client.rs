//! [`MessagingClient`] backed by the sidecar.

use std::{path::PathBuf, sync::Arc};

use {
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    switchboard_channels::{
        ClientEventSender, ClientFactory, ClientSpec, Error, MessagingClient, OutboundMessage,
        Result, SentMessage,
    },
    tracing::debug,
};

use crate::{
    sidecar::SidecarConnection,
    types::{GatewayRequest, SendPayload},
};

fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// One session's handle onto the shared sidecar connection.
pub struct SidecarClient {
    session_id: String,
    storage_path: PathBuf,
    events: ClientEventSender,
    conn: Arc<SidecarConnection>,
}

impl SidecarClient {
    pub fn new(spec: ClientSpec, conn: Arc<SidecarConnection>) -> Self {
        Self {
            session_id: spec.session_id,
            storage_path: spec.storage_path,
            events: spec.events,
            conn,
        }
    }
}

#[async_trait]
impl MessagingClient for SidecarClient {
    async fn initialize(&self) -> Result<()> {
        self.conn.register_route(self.events.clone());
        let result = self
            .conn
            .request(GatewayRequest::Init {
                request_id: request_id(),
                session_id: self.session_id.clone(),
                generation: self.events.generation(),
                auth_dir: self.storage_path.display().to_string(),
            })
            .await;
        if result.is_err() {
            self.conn
                .unregister_route(&self.session_id, self.events.generation());
        }
        result.map(|_| ())
    }

    async fn logout(&self) -> Result<()> {
        self.conn
            .request(GatewayRequest::Logout {
                request_id: request_id(),
                session_id: self.session_id.clone(),
                generation: self.events.generation(),
            })
            .await
            .map(|_| ())
    }

    async fn destroy(&self) -> Result<()> {
        self.conn
            .unregister_route(&self.session_id, self.events.generation());
        if !self.conn.is_connected() {
            debug!(session_id = %self.session_id, "sidecar gone, nothing to destroy");
            return Ok(());
        }
        self.conn
            .request(GatewayRequest::Destroy {
                request_id: request_id(),
                session_id: self.session_id.clone(),
                generation: self.events.generation(),
            })
            .await
            .map(|_| ())
    }

    async fn is_registered(&self, address: &str) -> Result<bool> {
        let data = self
            .conn
            .request(GatewayRequest::CheckNumber {
                request_id: request_id(),
                session_id: self.session_id.clone(),
                address: address.to_string(),
            })
            .await?;
        data.get("registered")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| Error::invalid_input("check_number response missing `registered`"))
    }

    async fn send(&self, to: &str, message: OutboundMessage) -> Result<SentMessage> {
        let payload = match message {
            OutboundMessage::Text { body, link_preview } => SendPayload::Text { body, link_preview },
            OutboundMessage::Media(media) => SendPayload::Media {
                media_kind: media.kind,
                data: STANDARD.encode(&media.data),
                mime_type: media.mime_type,
                filename: media.filename,
                caption: media.caption,
            },
        };
        let data = self
            .conn
            .request(GatewayRequest::Send {
                request_id: request_id(),
                session_id: self.session_id.clone(),
                to: to.to_string(),
                payload,
            })
            .await?;
        Ok(SentMessage {
            message_id: data
                .get("message_id")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        })
    }
}

/// Builds [`SidecarClient`]s over one shared connection.
pub struct SidecarClientFactory {
    conn: Arc<SidecarConnection>,
}

impl SidecarClientFactory {
    pub fn new(conn: Arc<SidecarConnection>) -> Self {
        Self { conn }
    }
}

impl ClientFactory for SidecarClientFactory {
    fn create(&self, spec: ClientSpec) -> Result<Arc<dyn MessagingClient>> {
        if !self.conn.is_connected() {
            return Err(Error::unavailable("sidecar is not connected"));
        }
        Ok(Arc::new(SidecarClient::new(spec, Arc::clone(&self.conn))))
    }
}
