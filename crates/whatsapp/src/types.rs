//! JSON frames exchanged with the sidecar.

use {
    serde::{Deserialize, Serialize},
    switchboard_channels::{ClientEvent, MediaKind},
};

/// Gateway → sidecar request. Every request carries a `request_id` the
/// sidecar echoes back in its [`SidecarMessage::Response`].
///
/// Lifecycle requests also carry the handle `generation`. The sidecar keeps
/// the generation of the latest `init` per session and ignores `logout` or
/// `destroy` for an older one, so teardown of a replaced handle cannot close
/// its successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayRequest {
    Init {
        request_id: String,
        session_id: String,
        generation: u64,
        auth_dir: String,
    },
    Logout {
        request_id: String,
        session_id: String,
        generation: u64,
    },
    Destroy {
        request_id: String,
        session_id: String,
        generation: u64,
    },
    CheckNumber {
        request_id: String,
        session_id: String,
        address: String,
    },
    Send {
        request_id: String,
        session_id: String,
        to: String,
        payload: SendPayload,
    },
}

impl GatewayRequest {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Init { request_id, .. }
            | Self::Logout { request_id, .. }
            | Self::Destroy { request_id, .. }
            | Self::CheckNumber { request_id, .. }
            | Self::Send { request_id, .. } => request_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Logout { .. } => "logout",
            Self::Destroy { .. } => "destroy",
            Self::CheckNumber { .. } => "check_number",
            Self::Send { .. } => "send",
        }
    }
}

/// Body of a `send` request. Media bytes travel base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendPayload {
    Text {
        body: String,
        link_preview: bool,
    },
    Media {
        media_kind: MediaKind,
        data: String,
        mime_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

/// Sidecar → gateway frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Qr {
        session_id: String,
        qr: String,
    },
    Authenticated {
        session_id: String,
    },
    Ready {
        session_id: String,
    },
    AuthFailure {
        session_id: String,
        #[serde(default)]
        reason: String,
    },
    Disconnected {
        session_id: String,
        #[serde(default)]
        reason: String,
    },
    Response(ResponseFrame),
}

impl SidecarMessage {
    /// Split a lifecycle frame into its session id and event.
    /// Returns `None` for responses.
    pub fn into_session_event(self) -> Option<(String, ClientEvent)> {
        let pair = match self {
            Self::Qr { session_id, qr } => (session_id, ClientEvent::Qr { code: qr }),
            Self::Authenticated { session_id } => (session_id, ClientEvent::Authenticated),
            Self::Ready { session_id } => (session_id, ClientEvent::Ready),
            Self::AuthFailure { session_id, reason } => {
                (session_id, ClientEvent::AuthFailure { reason })
            },
            Self::Disconnected { session_id, reason } => {
                (session_id, ClientEvent::Disconnected { reason })
            },
            Self::Response(_) => return None,
        };
        Some(pair)
    }
}

/// Reply to a [`GatewayRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub request_id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn request_wire_shape() {
        let req = GatewayRequest::CheckNumber {
            request_id: "r1".into(),
            session_id: "shop".into(),
            address: "919876543210@c.us".into(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "type": "check_number",
                "request_id": "r1",
                "session_id": "shop",
                "address": "919876543210@c.us",
            })
        );
        assert_eq!(req.request_id(), "r1");
    }

    #[test]
    fn destroy_carries_handle_generation() {
        let req = GatewayRequest::Destroy {
            request_id: "r2".into(),
            session_id: "shop".into(),
            generation: 4,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "type": "destroy",
                "request_id": "r2",
                "session_id": "shop",
                "generation": 4,
            })
        );
    }

    #[test]
    fn media_payload_omits_empty_optionals() {
        let payload = SendPayload::Media {
            media_kind: MediaKind::Voice,
            data: "AAE=".into(),
            mime_type: "audio/ogg".into(),
            filename: None,
            caption: None,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "kind": "media",
                "media_kind": "voice",
                "data": "AAE=",
                "mime_type": "audio/ogg",
            })
        );
    }

    #[test]
    fn lifecycle_frames_map_to_events() {
        let msg: SidecarMessage =
            serde_json::from_value(json!({"type": "qr", "session_id": "s", "qr": "2@abc"}))
                .unwrap();
        assert_eq!(
            msg.into_session_event(),
            Some(("s".to_string(), ClientEvent::Qr {
                code: "2@abc".into()
            }))
        );

        let msg: SidecarMessage =
            serde_json::from_value(json!({"type": "disconnected", "session_id": "s"})).unwrap();
        assert_eq!(
            msg.into_session_event(),
            Some(("s".to_string(), ClientEvent::Disconnected {
                reason: String::new()
            }))
        );
    }

    #[test]
    fn response_frame_parses_with_defaults() {
        let msg: SidecarMessage =
            serde_json::from_value(json!({"type": "response", "request_id": "r9", "ok": true}))
                .unwrap();
        let SidecarMessage::Response(frame) = msg else {
            panic!("expected response");
        };
        assert!(frame.ok);
        assert!(frame.data.is_null());
        assert!(frame.error.is_none());
    }
}
