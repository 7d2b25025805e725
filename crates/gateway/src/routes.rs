//! HTTP handlers.

use {
    axum::{
        Json,
        extract::{Path, State, rejection::JsonRejection},
    },
    serde::Deserialize,
    serde_json::{Value, json},
    switchboard_dispatch::{IntentFields, MessageIntent},
    switchboard_sessions::SessionState,
    tracing::info,
};

use crate::{error::ApiError, state::AppState};

type ApiResult = Result<Json<Value>, ApiError>;

/// Fail with one validation error naming every absent or blank field.
fn require<'a, const N: usize>(
    fields: [(&'static str, Option<&'a str>); N],
) -> Result<[&'a str; N], ApiError> {
    let missing: Vec<_> = fields
        .iter()
        .filter(|(_, v)| v.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    }
    Ok(fields.map(|(_, v)| v.unwrap_or_default()))
}

// ── Messaging ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    session_name: Option<String>,
    number: Option<String>,
    message: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let [session, number, message] = require([
        ("sessionName", req.session_name.as_deref()),
        ("number", req.number.as_deref()),
        ("message", req.message.as_deref()),
    ])?;

    let delivery = state
        .dispatcher
        .send(session, number, MessageIntent::text(message))
        .await
        .map_err(|e| ApiError::from(e).not_found_as_bad_request())?;

    Ok(Json(json!({
        "success": true,
        "number": delivery.to,
        "sessionName": delivery.session_id,
        "messageId": delivery.message_id,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedMessageRequest {
    session_name: Option<String>,
    number: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(flatten)]
    fields: IntentFields,
}

pub async fn send_unified_message(
    State(state): State<AppState>,
    payload: Result<Json<UnifiedMessageRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let [session, number, kind] = require([
        ("sessionName", req.session_name.as_deref()),
        ("number", req.number.as_deref()),
        ("type", req.kind.as_deref()),
    ])?;
    let delivery = state
        .dispatcher
        .send_tagged(session, number, kind, req.fields)
        .await
        .map_err(|e| ApiError::from(e).not_found_as_bad_request())?;

    Ok(Json(json!({
        "success": true,
        "number": delivery.to,
        "type": kind,
        "sessionName": delivery.session_id,
        "messageId": delivery.message_id,
    })))
}

// ── Session lifecycle ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    session_name: Option<String>,
}

pub async fn create_session(
    State(state): State<AppState>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let [name] = require([("sessionName", req.session_name.as_deref())])?;

    let info = state.sessions.create(name).await?;
    info!(requested = name, session_id = %info.id, "session create requested over http");
    Ok(Json(json!({
        "success": true,
        "sessionName": name,
        "actualSessionName": info.id,
        "status": info.state,
        "message": "Session is initializing; poll the status or QR endpoint for progress",
    })))
}

pub async fn delete_session(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let id = state.sessions.delete(&name).await?;
    Ok(Json(json!({
        "success": true,
        "deletedSessionName": id,
    })))
}

pub async fn logout_session(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let id = state.sessions.logout(&name).await?;
    Ok(Json(json!({
        "success": true,
        "actualSessionName": id,
    })))
}

pub async fn session_status(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let info = state.sessions.status(&name).await?;
    Ok(Json(json!({
        "requestedSessionName": name,
        "actualSessionName": info.id,
        "status": info.state,
        "exists": true,
        "updatedAt": info.updated_at,
    })))
}

fn qr_message(state: SessionState, has_qr: bool) -> &'static str {
    match state {
        SessionState::QrGenerated if has_qr => {
            "Scan the QR code with the WhatsApp app to link this session"
        },
        SessionState::Uninitialized | SessionState::Initializing | SessionState::QrGenerated => {
            "QR code not generated yet, try again shortly"
        },
        SessionState::Authenticated => "Session authenticated, finishing setup",
        SessionState::Ready => "Session is already linked and ready",
        SessionState::AuthFailed => "Authentication failed; delete the session and create it again",
        SessionState::Timeout => "Session did not start in time; still waiting for a QR code",
        SessionState::Disconnected | SessionState::Error => "Session is not available",
    }
}

pub async fn session_qr(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult {
    let info = state.sessions.status(&name).await?;
    let qr = info
        .last_qr
        .as_deref()
        .filter(|_| info.state == SessionState::QrGenerated);

    let mut body = json!({
        "sessionName": name,
        "actualSessionName": info.id,
        "status": info.state,
        "message": qr_message(info.state, qr.is_some()),
    });
    if let Some(qr) = qr {
        body["qr"] = Value::String(qr.to_string());
    }
    Ok(Json(body))
}

pub async fn list_sessions(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "sessions": state.sessions.list().await }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let status = if state.sessions.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(json!({
        "status": status,
        "version": state.version,
        "sessions": state.sessions.states().await,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_names_every_missing_field() {
        let err = require([("a", Some("x")), ("b", None), ("c", Some("  "))]).unwrap_err();
        assert_eq!(err.message, "missing required field(s): b, c");
        assert_eq!(require([("a", Some("x"))]).unwrap(), ["x"]);
    }

    #[test]
    fn qr_message_only_offers_scan_with_code() {
        assert!(qr_message(SessionState::QrGenerated, true).contains("Scan"));
        assert!(qr_message(SessionState::QrGenerated, false).contains("not generated"));
        assert!(qr_message(SessionState::Ready, false).contains("ready"));
    }
}
