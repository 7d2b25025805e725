//! Session lifecycle: create, delete, logout, event handling and shutdown.

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    switchboard_channels::{
        ClientEventSender, ClientFactory, ClientSpec, MessagingClient, SessionEvent, event_channel,
    },
    tokio::{
        sync::{Mutex, mpsc},
        task::JoinHandle,
    },
    tracing::{debug, error, info, warn},
};

use crate::{
    error::{Error, Result},
    key::SessionId,
    registry::{EventOutcome, IgnoreReason, Registration, SessionEntry, SessionInfo, SessionRegistry},
    state::SessionState,
    storage::SessionStorage,
};

/// Upper bound on one handle teardown during delete, disconnect or shutdown.
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A session in `ready` state, resolved for sending.
#[derive(Clone)]
pub struct ReadySession {
    pub id: SessionId,
    pub client: Arc<dyn MessagingClient>,
}

impl std::fmt::Debug for ReadySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadySession").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Result of draining all sessions.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    pub drained: Vec<SessionId>,
    /// Sessions whose teardown failed, with the error text.
    pub failures: Vec<(SessionId, String)>,
}

/// Result of recreating sessions from storage at startup.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub restored: Vec<SessionId>,
    pub failures: Vec<(SessionId, String)>,
}

/// Drives creation, teardown and state transitions of sessions.
///
/// Owns the registry, the client factory and the event loop that applies
/// client-reported lifecycle events.
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn ClientFactory>,
    storage: SessionStorage,
    init_timeout: Duration,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl SessionManager {
    /// Build the manager and spawn its event loop. Must be called from
    /// within a Tokio runtime.
    pub fn new(
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn ClientFactory>,
        storage: SessionStorage,
        init_timeout: Duration,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = event_channel();
        let event_loop = tokio::spawn(run_event_loop(Arc::clone(&registry), events_rx));

        Arc::new(Self {
            registry,
            factory,
            storage,
            init_timeout,
            events_tx,
            event_loop: Mutex::new(Some(event_loop)),
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Register a new session and start initializing it in the background.
    ///
    /// Returns as soon as the handle is constructed; poll [`Self::status`]
    /// for progress.
    pub async fn create(&self, requested: &str) -> Result<SessionInfo> {
        if self.is_shutting_down() {
            return Err(Error::ShuttingDown);
        }
        if requested.trim().is_empty() {
            return Err(Error::invalid_name("session name is empty"));
        }

        let info = self
            .registry
            .register(requested, |id, generation| {
                let storage_path = self.storage.path_for(id);
                let spec = ClientSpec {
                    session_id: id.to_string(),
                    storage_path: storage_path.clone(),
                    events: ClientEventSender::new(
                        id.as_str(),
                        generation,
                        self.events_tx.clone(),
                    ),
                };
                let client = self.factory.create(spec).map_err(|source| Error::Client {
                    id: id.clone(),
                    source,
                })?;
                Ok(Registration {
                    client,
                    storage_path,
                })
            })
            .await
            .inspect_err(|e| debug!(requested, error = %e, "session registration refused"))?;

        let id = info.id.clone();
        let generation = info.generation;

        if let Err(source) = self.storage.ensure(&id).await {
            error!(session_id = %id, error = %source, "failed to create session storage");
            if let Some(entry) = self.registry.remove_generation(&id, generation).await
                && let Err(e) = teardown(entry).await
            {
                warn!(session_id = %id, error = %e, "teardown after storage failure failed");
            }
            return Err(Error::Storage {
                path: self.storage.path_for(&id),
                source,
            });
        }

        // Deleted or drained between register and here; its teardown already ran.
        let removed = || {
            debug!(session_id = %id, generation, "session removed before initialization");
            if self.is_shutting_down() {
                Error::ShuttingDown
            } else {
                Error::not_found(requested)
            }
        };
        let Some((_, client)) = self.registry.handle(&id).await else {
            return Err(removed());
        };
        if !self.registry.mark_initializing(&id, generation).await {
            return Err(removed());
        }
        info!(session_id = %id, requested, generation, "session created, initializing");

        self.spawn_initialize(id.clone(), generation, client);
        self.spawn_init_deadline(id.clone(), generation);

        self.registry
            .get(&id)
            .await
            .ok_or_else(|| Error::not_found(requested))
    }

    /// Initialize the handle unless its entry is gone. A handle whose entry
    /// disappears while `initialize` is in flight is destroyed again once it
    /// returns.
    fn spawn_initialize(&self, id: SessionId, generation: u64, client: Arc<dyn MessagingClient>) {
        let registry = Arc::clone(&self.registry);
        tokio::spawn(async move {
            if !registry.is_current(&id, generation).await {
                debug!(session_id = %id, generation, "session removed before initialization, skipping");
                return;
            }
            match client.initialize().await {
                Ok(()) if registry.is_current(&id, generation).await => {
                    debug!(session_id = %id, "initialization request issued");
                },
                Ok(()) => {
                    warn!(session_id = %id, generation, "session removed during initialization, destroying handle");
                    if let Err(e) = destroy_handle(client.as_ref()).await {
                        warn!(session_id = %id, error = %e, "teardown of orphaned handle failed");
                    }
                },
                Err(e) => {
                    error!(session_id = %id, error = %e, "session initialization failed");
                    if let Some(mut entry) = registry.remove_generation(&id, generation).await {
                        entry.state = SessionState::Error;
                        if let Err(e) = teardown(entry).await {
                            warn!(session_id = %id, error = %e, "teardown after failed initialization failed");
                        }
                    }
                },
            }
        });
    }

    fn spawn_init_deadline(&self, id: SessionId, generation: u64) {
        let registry = Arc::clone(&self.registry);
        let deadline = self.init_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            if registry.mark_timeout(&id, generation).await {
                warn!(
                    session_id = %id,
                    timeout_secs = deadline.as_secs(),
                    "session made no progress before deadline"
                );
            }
        });
    }

    /// Tear down the handle, drop the entry and remove persisted storage.
    ///
    /// Teardown and storage failures are logged, not returned.
    pub async fn delete(&self, requested: &str) -> Result<SessionId> {
        let id = self
            .registry
            .resolve(requested)
            .await
            .ok_or_else(|| Error::not_found(requested))?;
        let entry = self
            .registry
            .remove(&id)
            .await
            .ok_or_else(|| Error::not_found(requested))?;

        if let Err(e) = teardown(entry).await {
            warn!(session_id = %id, error = %e, "session teardown failed during delete");
        }
        match self.storage.remove(&id).await {
            Ok(removed) => debug!(session_id = %id, removed, "session storage cleared"),
            Err(e) => warn!(session_id = %id, error = %e, "failed to remove session storage"),
        }

        info!(session_id = %id, requested, "session deleted");
        Ok(id)
    }

    /// Invalidate credentials but keep the entry and its storage.
    pub async fn logout(&self, requested: &str) -> Result<SessionId> {
        let id = self
            .registry
            .resolve(requested)
            .await
            .ok_or_else(|| Error::not_found(requested))?;
        let (_, client) = self
            .registry
            .handle(&id)
            .await
            .ok_or_else(|| Error::not_found(requested))?;

        client.logout().await.map_err(|source| Error::Client {
            id: id.clone(),
            source,
        })?;
        info!(session_id = %id, "session logged out");
        Ok(id)
    }

    pub async fn status(&self, requested: &str) -> Result<SessionInfo> {
        self.registry
            .lookup(requested)
            .await
            .ok_or_else(|| Error::not_found(requested))
    }

    pub async fn states(&self) -> BTreeMap<String, SessionState> {
        self.registry.states().await
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        self.registry.list().await
    }

    /// Resolve `requested` and require it to be exactly `ready`.
    pub async fn ready_client(&self, requested: &str) -> Result<ReadySession> {
        let id = self
            .registry
            .resolve(requested)
            .await
            .ok_or_else(|| Error::not_found(requested))?;
        let (state, client) = self
            .registry
            .handle(&id)
            .await
            .ok_or_else(|| Error::not_found(requested))?;

        if state != SessionState::Ready {
            return Err(Error::NotReady { id, state });
        }
        Ok(ReadySession { id, client })
    }

    /// Recreate a session for every directory under the storage root.
    pub async fn restore_persisted(&self) -> Result<RestoreReport> {
        let ids = self.storage.list().await.map_err(|source| Error::Storage {
            path: self.storage.root().clone(),
            source,
        })?;

        let mut report = RestoreReport::default();
        for id in ids {
            match self.create(id.as_str()).await {
                Ok(info) => report.restored.push(info.id),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "failed to restore session");
                    report.failures.push((id, e.to_string()));
                },
            }
        }
        info!(
            restored = report.restored.len(),
            failed = report.failures.len(),
            "restored persisted sessions"
        );
        Ok(report)
    }

    /// Stop accepting new sessions and tear down every registered one.
    ///
    /// Every handle is attempted; failures are collected and logged.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.shutting_down.store(true, Ordering::SeqCst);
        let entries = self.registry.drain().await;
        info!(count = entries.len(), "draining sessions");

        let mut report = ShutdownReport::default();
        for entry in entries {
            let id = entry.id.clone();
            if let Err(e) = teardown(entry).await {
                warn!(session_id = %id, error = %e, "session teardown failed during shutdown");
                report.failures.push((id.clone(), e));
            }
            report.drained.push(id);
        }

        if let Some(handle) = self.event_loop.lock().await.take() {
            handle.abort();
        }
        info!(
            drained = report.drained.len(),
            failed = report.failures.len(),
            "session drain complete"
        );
        report
    }
}

/// Destroy a handle, bounded by [`TEARDOWN_TIMEOUT`].
async fn destroy_handle(client: &dyn MessagingClient) -> std::result::Result<(), String> {
    match tokio::time::timeout(TEARDOWN_TIMEOUT, client.destroy()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "destroy timed out after {}s",
            TEARDOWN_TIMEOUT.as_secs()
        )),
    }
}

async fn teardown(entry: SessionEntry) -> std::result::Result<(), String> {
    destroy_handle(entry.client.as_ref()).await?;
    debug!(session_id = %entry.id, state = %entry.state, "session handle destroyed");
    Ok(())
}

async fn run_event_loop(
    registry: Arc<SessionRegistry>,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    while let Some(ev) = events.recv().await {
        let kind = ev.event.name();
        match registry.apply_event(&ev).await {
            EventOutcome::Updated { from, to } => {
                info!(session_id = %ev.session_id, event = kind, %from, %to, "session state changed");
            },
            EventOutcome::Removed(entry) => {
                warn!(session_id = %ev.session_id, event = ?ev.event, "session disconnected, removed from registry");
                tokio::spawn(async move {
                    let id = entry.id.clone();
                    if let Err(e) = teardown(entry).await {
                        warn!(session_id = %id, error = %e, "teardown after disconnect failed");
                    }
                });
            },
            EventOutcome::Ignored(IgnoreReason::NotAllowed(state)) => {
                debug!(session_id = %ev.session_id, event = kind, %state, "event not valid from current state");
            },
            EventOutcome::Ignored(reason) => {
                debug!(session_id = %ev.session_id, event = kind, ?reason, "event ignored");
            },
        }
    }
    debug!("session event loop finished");
}
