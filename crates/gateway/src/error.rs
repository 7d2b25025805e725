//! Request-boundary error type: every failure becomes
//! `{ "success": false, "error": <kind>, "message": ... }`.

use {
    axum::{
        Json,
        extract::rejection::JsonRejection,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    switchboard_dispatch::Error as DispatchError,
    switchboard_sessions::Error as SessionError,
    tracing::{error, warn},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    /// Send endpoints report a missing session as a bad request rather than 404.
    #[must_use]
    pub fn not_found_as_bad_request(mut self) -> Self {
        if self.kind == "not_found" {
            self.status = StatusCode::BAD_REQUEST;
        }
        self
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::InvalidName { .. } => Self::validation(message),
            SessionError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", message),
            SessionError::AlreadyExists { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "already_exists", message)
            },
            SessionError::NotReady { .. } => Self::new(StatusCode::BAD_REQUEST, "not_ready", message),
            SessionError::ShuttingDown => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "shutting_down", message)
            },
            SessionError::Client { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "client_error", message)
            },
            SessionError::Storage { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            },
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Session(e) => e.into(),
            DispatchError::InvalidPhone { .. } | DispatchError::MissingField { .. } => {
                Self::validation(message)
            },
            DispatchError::Unregistered { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "unregistered_destination", message)
            },
            DispatchError::UnsupportedType { .. } => {
                Self::new(StatusCode::BAD_REQUEST, "unsupported_type", message)
            },
            DispatchError::Fetch(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "fetch_failed", message)
            },
            DispatchError::Client(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "client_error", message)
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(kind = self.kind, status = %self.status, message = %self.message, "request failed");
        } else {
            warn!(kind = self.kind, status = %self.status, message = %self.message, "request rejected");
        }
        (
            self.status,
            Json(serde_json::json!({
                "success": false,
                "error": self.kind,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, switchboard_sessions::SessionId};

    #[test]
    fn session_errors_map_to_statuses() {
        let id = SessionId::from_requested("shop");
        let cases = [
            (SessionError::not_found("x"), StatusCode::NOT_FOUND, "not_found"),
            (
                SessionError::AlreadyExists { id: id.clone() },
                StatusCode::BAD_REQUEST,
                "already_exists",
            ),
            (
                SessionError::NotReady {
                    id,
                    state: switchboard_sessions::SessionState::QrGenerated,
                },
                StatusCode::BAD_REQUEST,
                "not_ready",
            ),
            (
                SessionError::ShuttingDown,
                StatusCode::SERVICE_UNAVAILABLE,
                "shutting_down",
            ),
            (
                SessionError::invalid_name("empty"),
                StatusCode::BAD_REQUEST,
                "validation",
            ),
        ];
        for (err, status, kind) in cases {
            let api = ApiError::from(err);
            assert_eq!((api.status, api.kind), (status, kind), "{}", api.message);
        }
    }

    #[test]
    fn dispatch_errors_map_to_statuses() {
        let api = ApiError::from(DispatchError::UnsupportedType {
            kind: "sticker".into(),
        });
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.message, "unsupported message type: sticker");

        let api = ApiError::from(DispatchError::Unregistered {
            address: "1@c.us".into(),
        });
        assert_eq!(api.kind, "unregistered_destination");

        let api = ApiError::from(DispatchError::Client(
            switchboard_channels::Error::rejected("boom"),
        ));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(api.message.contains("boom"));
    }

    #[test]
    fn send_endpoints_downgrade_not_found() {
        let api = ApiError::from(DispatchError::Session(SessionError::not_found("x")))
            .not_found_as_bad_request();
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.kind, "not_found");

        let api = ApiError::from(SessionError::ShuttingDown).not_found_as_bad_request();
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
