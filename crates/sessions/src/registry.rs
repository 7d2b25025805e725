//! Authoritative in-memory map from session id to session entry.

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use {
    switchboard_channels::{ClientEvent, MessagingClient, SessionEvent},
    switchboard_common::time::unix_now_ms,
    tokio::sync::RwLock,
};

use crate::{
    error::{Error, Result},
    key::{SessionId, normalize},
    state::{SessionState, Transition, on_init_deadline, transition},
};

// ── Aliases ─────────────────────────────────────────────────────────────────

/// Legacy names mapped to the internal id they were historically stored under.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, SessionId>,
}

impl AliasTable {
    /// Build from config. Targets are normalized so a hand-written target
    /// still matches the registry key.
    pub fn from_config(raw: &HashMap<String, String>) -> Self {
        Self {
            entries: raw
                .iter()
                .map(|(name, target)| (name.clone(), SessionId::from_requested(target)))
                .collect(),
        }
    }

    pub fn get(&self, requested: &str) -> Option<&SessionId> {
        self.entries.get(requested)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve `requested` against a key set: exact key, then normalized key,
/// then alias (only when the alias target is present).
pub fn resolve_in(
    contains: impl Fn(&str) -> bool,
    aliases: &AliasTable,
    requested: &str,
) -> Option<SessionId> {
    if contains(requested) {
        return Some(SessionId::from_requested(requested));
    }
    let normalized = normalize(requested);
    if !normalized.is_empty() && contains(&normalized) {
        return Some(SessionId::from_requested(&normalized));
    }
    aliases
        .get(requested)
        .filter(|target| contains(target.as_str()))
        .cloned()
}

// ── Entries ─────────────────────────────────────────────────────────────────

/// A registered session. Owns its client handle.
pub struct SessionEntry {
    pub id: SessionId,
    pub requested_name: String,
    pub state: SessionState,
    pub generation: u64,
    pub client: Arc<dyn MessagingClient>,
    pub storage_path: PathBuf,
    pub last_qr: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SessionEntry {
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            requested_name: self.requested_name.clone(),
            state: self.state,
            generation: self.generation,
            last_qr: self.last_qr.clone(),
            storage_path: self.storage_path.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn enter(&mut self, state: SessionState) {
        self.state = state;
        self.updated_at = unix_now_ms();
    }
}

/// Read-only snapshot of a [`SessionEntry`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub requested_name: String,
    pub state: SessionState,
    pub generation: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_qr: Option<String>,
    pub storage_path: PathBuf,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Handle plus storage location produced while registering a session.
pub struct Registration {
    pub client: Arc<dyn MessagingClient>,
    pub storage_path: PathBuf,
}

/// Why an event did not change anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No session with that id is registered.
    Unknown,
    /// The event came from a handle that has since been replaced.
    Stale { current_generation: u64 },
    /// The event is not valid from the current state.
    NotAllowed(SessionState),
}

/// Result of applying a client event.
pub enum EventOutcome {
    Updated {
        from: SessionState,
        to: SessionState,
    },
    /// The entry was dropped; the caller owns teardown of the handle.
    Removed(SessionEntry),
    Ignored(IgnoreReason),
}

// ── Registry ────────────────────────────────────────────────────────────────

/// Session id → entry, behind an async lock.
///
/// Lookups take the read lock; every mutation takes the write lock, and
/// registration performs its existence check and insert under one write lock.
/// Once [`Self::drain`] has run the registry is closed and refuses new
/// registrations.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    aliases: AliasTable,
    next_generation: AtomicU64,
    /// Only read or written while the write lock is held.
    closed: AtomicBool,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(AliasTable::default())
    }
}

impl SessionRegistry {
    pub fn new(aliases: AliasTable) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            aliases,
            next_generation: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub async fn resolve(&self, requested: &str) -> Option<SessionId> {
        let sessions = self.sessions.read().await;
        resolve_in(|k| sessions.contains_key(k), &self.aliases, requested)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.read().await.get(id).map(SessionEntry::info)
    }

    /// Resolve and snapshot in one read.
    pub async fn lookup(&self, requested: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        let id = resolve_in(|k| sessions.contains_key(k), &self.aliases, requested)?;
        sessions.get(&id).map(SessionEntry::info)
    }

    /// Current state and a clone of the handle.
    pub async fn handle(
        &self,
        id: &SessionId,
    ) -> Option<(SessionState, Arc<dyn MessagingClient>)> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|e| (e.state, Arc::clone(&e.client)))
    }

    /// Atomically check that `requested` does not resolve and insert a new
    /// `uninitialized` entry built by `build`.
    ///
    /// `build` runs under the write lock and receives the new id and its
    /// generation; it must not block.
    pub async fn register<F>(&self, requested: &str, build: F) -> Result<SessionInfo>
    where
        F: FnOnce(&SessionId, u64) -> Result<Registration>,
    {
        let mut sessions = self.sessions.write().await;

        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if let Some(id) = resolve_in(|k| sessions.contains_key(k), &self.aliases, requested) {
            return Err(Error::AlreadyExists { id });
        }

        let id = SessionId::from_requested(requested);
        if id.is_empty() {
            return Err(Error::invalid_name(format!(
                "{requested:?} contains no usable characters"
            )));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let Registration {
            client,
            storage_path,
        } = build(&id, generation)?;

        let now = unix_now_ms();
        let entry = SessionEntry {
            id: id.clone(),
            requested_name: requested.to_string(),
            state: SessionState::Uninitialized,
            generation,
            client,
            storage_path,
            last_qr: None,
            created_at: now,
            updated_at: now,
        };
        let info = entry.info();
        sessions.insert(id, entry);
        Ok(info)
    }

    /// Whether `id` is still registered with this handle generation.
    pub async fn is_current(&self, id: &SessionId, generation: u64) -> bool {
        self.sessions
            .read()
            .await
            .get(id)
            .is_some_and(|e| e.generation == generation)
    }

    /// `uninitialized → initializing` for the given handle generation.
    pub async fn mark_initializing(&self, id: &SessionId, generation: u64) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(entry)
                if entry.generation == generation
                    && entry.state == SessionState::Uninitialized =>
            {
                entry.enter(SessionState::Initializing);
                true
            },
            _ => false,
        }
    }

    /// Apply the init deadline. Returns `true` if the session moved to `timeout`.
    pub async fn mark_timeout(&self, id: &SessionId, generation: u64) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }
        match on_init_deadline(entry.state) {
            Some(next) => {
                entry.enter(next);
                true
            },
            None => false,
        }
    }

    /// Apply a client-reported event.
    pub async fn apply_event(&self, ev: &SessionEvent) -> EventOutcome {
        let mut sessions = self.sessions.write().await;
        let Some(entry) = sessions.get_mut(ev.session_id.as_str()) else {
            return EventOutcome::Ignored(IgnoreReason::Unknown);
        };
        if entry.generation != ev.generation {
            return EventOutcome::Ignored(IgnoreReason::Stale {
                current_generation: entry.generation,
            });
        }

        let from = entry.state;
        match transition(from, &ev.event) {
            Transition::Enter(to) => {
                match &ev.event {
                    ClientEvent::Qr { code } => entry.last_qr = Some(code.clone()),
                    ClientEvent::Authenticated | ClientEvent::Ready => entry.last_qr = None,
                    _ => {},
                }
                entry.enter(to);
                EventOutcome::Updated { from, to }
            },
            Transition::Remove => match sessions.remove(ev.session_id.as_str()) {
                Some(mut removed) => {
                    removed.enter(SessionState::Disconnected);
                    EventOutcome::Removed(removed)
                },
                None => EventOutcome::Ignored(IgnoreReason::Unknown),
            },
            Transition::Ignore => EventOutcome::Ignored(IgnoreReason::NotAllowed(from)),
        }
    }

    pub async fn remove(&self, id: &SessionId) -> Option<SessionEntry> {
        self.sessions.write().await.remove(id)
    }

    /// Remove `id` only if it is still the given handle generation.
    pub async fn remove_generation(&self, id: &SessionId, generation: u64) -> Option<SessionEntry> {
        let mut sessions = self.sessions.write().await;
        if sessions.get(id)?.generation != generation {
            return None;
        }
        sessions.remove(id)
    }

    /// Close the registry and remove and return every entry.
    pub async fn drain(&self) -> Vec<SessionEntry> {
        let mut sessions = self.sessions.write().await;
        self.closed.store(true, Ordering::SeqCst);
        let mut entries: Vec<_> = sessions.drain().map(|(_, e)| e).collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// `id → state` for every registered session.
    pub async fn states(&self) -> BTreeMap<String, SessionState> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(id, e)| (id.to_string(), e.state))
            .collect()
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self
            .sessions
            .read()
            .await
            .values()
            .map(SessionEntry::info)
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
