//! Owns the sidecar process and connection for the lifetime of the gateway.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Result,
    switchboard_channels::ClientFactory,
    switchboard_config::WhatsAppSidecarConfig,
    tokio::sync::Mutex,
    tracing::{info, warn},
};

use crate::{
    client::SidecarClientFactory,
    process::{SidecarLaunch, SidecarProcess, find_sidecar_dir, start_sidecar},
    sidecar::{SidecarConnection, connect_with_retry},
};

const CONNECT_ATTEMPTS: u32 = 10;

pub struct WhatsAppBackend {
    conn: Arc<SidecarConnection>,
    process: Mutex<Option<SidecarProcess>>,
}

impl WhatsAppBackend {
    /// Start the sidecar (unless `auto_start` is off) and connect to it.
    pub async fn start(config: &WhatsAppSidecarConfig, auth_dir: PathBuf) -> Result<Self> {
        let process = if config.auto_start {
            let launch = SidecarLaunch {
                sidecar_dir: find_sidecar_dir(config.sidecar_dir.as_deref())?,
                port: config.port,
                auth_dir,
            };
            Some(start_sidecar(&launch).await?)
        } else {
            info!(port = config.port, "sidecar auto-start disabled, connecting to existing sidecar");
            None
        };

        let url = format!("ws://127.0.0.1:{}", config.port);
        let conn = connect_with_retry(
            &url,
            Duration::from_secs(config.request_timeout_secs),
            CONNECT_ATTEMPTS,
        )
        .await?;

        Ok(Self {
            conn,
            process: Mutex::new(process),
        })
    }

    pub fn factory(&self) -> Arc<dyn ClientFactory> {
        Arc::new(SidecarClientFactory::new(Arc::clone(&self.conn)))
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Stop the sidecar process if this backend started it.
    pub async fn shutdown(&self) {
        let Some(mut process) = self.process.lock().await.take() else {
            return;
        };
        if !process.is_running() {
            warn!(port = process.port(), "sidecar already exited");
            return;
        }
        if let Err(e) = process.stop().await {
            warn!(error = %e, "failed to stop sidecar");
        }
    }
}
