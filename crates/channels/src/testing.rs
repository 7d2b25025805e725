//! In-memory messaging backend for tests.
//!
//! [`FakeFactory`] remembers every client it builds so tests can push
//! lifecycle events into a session and inspect what was sent through it.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use {async_trait::async_trait, tokio::sync::watch};

use crate::{
    ClientEvent, ClientEventSender, ClientFactory, ClientSpec, Error, MessagingClient,
    OutboundMessage, Result, SentMessage,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared knobs applied to every client a [`FakeFactory`] builds.
struct Behaviour {
    fail_initialize: AtomicBool,
    fail_destroy: AtomicBool,
    fail_send: AtomicBool,
    /// While `true`, `initialize` parks after counting the call.
    initialize_held: watch::Sender<bool>,
    /// `None` means every address is registered.
    registered: Mutex<Option<HashSet<String>>>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            fail_initialize: AtomicBool::new(false),
            fail_destroy: AtomicBool::new(false),
            fail_send: AtomicBool::new(false),
            initialize_held: watch::channel(false).0,
            registered: Mutex::new(None),
        }
    }
}

/// Recording client handle.
pub struct FakeClient {
    events: ClientEventSender,
    storage_path: PathBuf,
    behaviour: Arc<Behaviour>,
    sent: Mutex<Vec<(String, OutboundMessage)>>,
    initialized: AtomicUsize,
    logged_out: AtomicUsize,
    destroyed: AtomicUsize,
}

impl FakeClient {
    pub fn session_id(&self) -> &str {
        self.events.session_id()
    }

    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn storage_path(&self) -> &PathBuf {
        &self.storage_path
    }

    /// Push a lifecycle event as if the network had reported it.
    pub fn emit(&self, event: ClientEvent) -> bool {
        self.events.emit(event)
    }

    pub fn sent(&self) -> Vec<(String, OutboundMessage)> {
        lock(&self.sent).clone()
    }

    pub fn initialize_calls(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingClient for FakeClient {
    async fn initialize(&self) -> Result<()> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        let mut held = self.behaviour.initialize_held.subscribe();
        let _ = held.wait_for(|held| !held).await;
        if self.behaviour.fail_initialize.load(Ordering::SeqCst) {
            return Err(Error::unavailable("browser failed to launch"));
        }
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.logged_out.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        if self.behaviour.fail_destroy.load(Ordering::SeqCst) {
            return Err(Error::unavailable("handle already closed"));
        }
        Ok(())
    }

    async fn is_registered(&self, address: &str) -> Result<bool> {
        Ok(lock(&self.behaviour.registered)
            .as_ref()
            .is_none_or(|set| set.contains(address)))
    }

    async fn send(&self, to: &str, message: OutboundMessage) -> Result<SentMessage> {
        if self.behaviour.fail_send.load(Ordering::SeqCst) {
            return Err(Error::rejected("send refused by network"));
        }
        let mut sent = lock(&self.sent);
        sent.push((to.to_string(), message));
        Ok(SentMessage {
            message_id: Some(format!("fake-{}", sent.len())),
        })
    }
}

/// Factory that hands out [`FakeClient`]s and keeps them for inspection.
#[derive(Default)]
pub struct FakeFactory {
    behaviour: Arc<Behaviour>,
    fail_create: AtomicBool,
    clients: Mutex<HashMap<String, Arc<FakeClient>>>,
    created: AtomicUsize,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent client built for `session_id`.
    pub fn client(&self, session_id: &str) -> Option<Arc<FakeClient>> {
        lock(&self.clients).get(session_id).cloned()
    }

    /// Push `event` into the most recent client for `session_id`.
    pub fn emit(&self, session_id: &str, event: ClientEvent) -> bool {
        self.client(session_id).is_some_and(|c| c.emit(event))
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.behaviour.fail_initialize.store(fail, Ordering::SeqCst);
    }

    /// Park every `initialize` call until released with `false`.
    pub fn hold_initialize(&self, hold: bool) {
        self.behaviour.initialize_held.send_replace(hold);
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.behaviour.fail_destroy.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send(&self, fail: bool) {
        self.behaviour.fail_send.store(fail, Ordering::SeqCst);
    }

    /// Restrict registered addresses to `addresses`.
    pub fn set_registered<I, S>(&self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *lock(&self.behaviour.registered) = Some(addresses.into_iter().map(Into::into).collect());
    }
}

impl ClientFactory for FakeFactory {
    fn create(&self, spec: ClientSpec) -> Result<Arc<dyn MessagingClient>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(Error::unavailable("client construction failed"));
        }
        let client = Arc::new(FakeClient {
            events: spec.events,
            storage_path: spec.storage_path,
            behaviour: Arc::clone(&self.behaviour),
            sent: Mutex::new(Vec::new()),
            initialized: AtomicUsize::new(0),
            logged_out: AtomicUsize::new(0),
            destroyed: AtomicUsize::new(0),
        });
        self.created.fetch_add(1, Ordering::SeqCst);
        lock(&self.clients).insert(spec.session_id, Arc::clone(&client));
        Ok(client)
    }
}
