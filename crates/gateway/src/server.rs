use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    axum::{
        Router,
        routing::{delete, get, post},
    },
    switchboard_config::SwitchboardConfig,
    switchboard_dispatch::Dispatcher,
    switchboard_media::MediaFetcher,
    switchboard_sessions::{AliasTable, SessionManager, SessionRegistry, SessionStorage},
    switchboard_whatsapp::WhatsAppBackend,
    tokio::net::TcpListener,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use crate::{routes, shutdown::wait_for_shutdown_signal, state::AppState};

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/sessions", get(routes::list_sessions))
        .route("/create-session", post(routes::create_session))
        .route("/session/{session_name}", delete(routes::delete_session))
        .route("/session/{session_name}/logout", post(routes::logout_session))
        .route("/session/{session_name}/status", get(routes::session_status))
        .route("/qr/{session_name}", get(routes::session_qr))
        .route("/send-message", post(routes::send_message))
        .route("/send-unified-message", post(routes::send_unified_message))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve `state` on `listener` until `shutdown` resolves, then drain every
/// session. No new sessions are accepted once draining starts.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let sessions = Arc::clone(&state.sessions);
    let app = build_app(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("http server failed")?;

    let report = sessions.shutdown().await;
    for (id, err) in &report.failures {
        warn!(session_id = %id, error = %err, "session did not shut down cleanly");
    }
    info!(drained = report.drained.len(), "http server stopped");
    Ok(())
}

fn resolve_auth_dir(config: &SwitchboardConfig) -> PathBuf {
    config
        .sessions
        .auth_dir
        .clone()
        .unwrap_or_else(|| switchboard_config::data_dir().join("sessions"))
}

/// Start the messaging backend and serve the HTTP API until a termination
/// signal arrives.
pub async fn start_gateway(config: SwitchboardConfig, bind: &str, port: u16) -> anyhow::Result<()> {
    let auth_dir = resolve_auth_dir(&config);
    tokio::fs::create_dir_all(&auth_dir)
        .await
        .with_context(|| format!("failed to create auth dir {}", auth_dir.display()))?;
    info!(auth_dir = %auth_dir.display(), "session storage");

    let backend = WhatsAppBackend::start(&config.whatsapp, auth_dir.clone())
        .await
        .context("failed to start messaging backend")?;

    let aliases = AliasTable::from_config(&config.sessions.aliases);
    if !aliases.is_empty() {
        info!(count = aliases.len(), "loaded session aliases");
    }
    let sessions = SessionManager::new(
        Arc::new(SessionRegistry::new(aliases)),
        backend.factory(),
        SessionStorage::new(auth_dir),
        Duration::from_secs(config.sessions.init_timeout_secs),
    );
    if config.sessions.restore_on_startup {
        sessions
            .restore_persisted()
            .await
            .context("failed to restore persisted sessions")?;
    }

    let media = MediaFetcher::from_config(&config.media).context("failed to build media client")?;
    let dispatcher = Dispatcher::from_config(Arc::clone(&sessions), media, &config.dispatch);
    let state = AppState::new(sessions, dispatcher);

    let addr: SocketAddr = format!("{bind}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {bind}:{port}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %listener.local_addr()?,
        version = state.version,
        sidecar_connected = backend.is_connected(),
        "gateway listening"
    );

    let result = serve(listener, state, wait_for_shutdown_signal()).await;
    backend.shutdown().await;
    result
}
