//! Termination signal handling.

use tracing::info;

/// Resolve on the first SIGINT or SIGTERM.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();

    tokio::select! {
        () = async {
            match sigterm.as_mut() {
                Some(sig) => { sig.recv().await; },
                None => std::future::pending::<()>().await,
            }
        } => info!("received SIGTERM, shutting down"),
        () = async {
            match sigint.as_mut() {
                Some(sig) => { sig.recv().await; },
                None => std::future::pending::<()>().await,
            }
        } => info!("received SIGINT, shutting down"),
    }
}

/// Resolve on Ctrl+C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("received Ctrl+C, shutting down");
    } else {
        std::future::pending::<()>().await;
    }
}
