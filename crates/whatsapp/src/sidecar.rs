//! WebSocket connection to the sidecar: request/response correlation and
//! routing of lifecycle frames to the session that owns them.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    anyhow::Context,
    futures::{SinkExt, StreamExt},
    switchboard_channels::{ClientEvent, ClientEventSender, Error, Result},
    tokio::sync::{mpsc, oneshot},
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info, warn},
};

use crate::types::{GatewayRequest, ResponseFrame, SidecarMessage};

pub const DEFAULT_SIDECAR_PORT: u16 = 18802;

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseFrame>>>>;
type Routes = Arc<Mutex<HashMap<String, ClientEventSender>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Live connection to the sidecar, shared by every session's client.
pub struct SidecarConnection {
    write_tx: mpsc::UnboundedSender<String>,
    pending: Pending,
    routes: Routes,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
}

impl SidecarConnection {
    /// Connect to `url` and spawn the reader and writer tasks.
    pub async fn connect(url: &str, request_timeout: Duration) -> anyhow::Result<Arc<Self>> {
        let (ws_stream, _response) = connect_async(url)
            .await
            .with_context(|| format!("failed to connect to sidecar at {url}"))?;
        let (mut ws_sink, mut ws_reader) = ws_stream.split();
        info!(url, "connected to sidecar");

        let (write_tx, mut write_rx) = mpsc::unbounded_channel::<String>();
        let pending: Pending = Arc::default();
        let routes: Routes = Arc::default();
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(async move {
            while let Some(frame) = write_rx.recv().await {
                if let Err(e) = ws_sink.send(Message::Text(frame.into())).await {
                    warn!(error = %e, "failed to write to sidecar");
                    break;
                }
            }
            let _ = ws_sink.close().await;
        });

        {
            let pending = Arc::clone(&pending);
            let routes = Arc::clone(&routes);
            let connected = Arc::clone(&connected);
            tokio::spawn(async move {
                while let Some(msg) = ws_reader.next().await {
                    match msg {
                        Ok(Message::Text(text)) => dispatch_frame(text.as_str(), &pending, &routes),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {},
                        Err(e) => {
                            warn!(error = %e, "sidecar connection error");
                            break;
                        },
                    }
                }
                connected.store(false, Ordering::SeqCst);
                on_connection_lost(&pending, &routes);
            });
        }

        Ok(Arc::new(Self {
            write_tx,
            pending,
            routes,
            connected,
            request_timeout,
        }))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.write_tx.is_closed()
    }

    /// Deliver lifecycle frames for `session_id` to `events`, replacing any
    /// previous route for that session.
    pub fn register_route(&self, events: ClientEventSender) {
        let session_id = events.session_id().to_string();
        lock(&self.routes).insert(session_id, events);
    }

    /// Drop the route for `session_id` if it still belongs to `generation`.
    pub fn unregister_route(&self, session_id: &str, generation: u64) {
        let mut routes = lock(&self.routes);
        if routes
            .get(session_id)
            .is_some_and(|r| r.generation() == generation)
        {
            routes.remove(session_id);
        }
    }

    /// Send `request` and wait for the matching response.
    pub async fn request(&self, request: GatewayRequest) -> Result<serde_json::Value> {
        if !self.is_connected() {
            return Err(Error::unavailable("sidecar is not connected"));
        }

        let request_id = request.request_id().to_string();
        let name = request.name();
        let frame = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id.clone(), tx);

        if self.write_tx.send(frame).is_err() {
            lock(&self.pending).remove(&request_id);
            return Err(Error::unavailable("sidecar writer closed"));
        }
        debug!(request_id = %request_id, request = name, "sent sidecar request");

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(Error::unavailable("sidecar connection lost")),
            Err(_) => {
                lock(&self.pending).remove(&request_id);
                return Err(Error::timeout(
                    format!("sidecar {name}"),
                    self.request_timeout.as_secs(),
                ));
            },
        };

        if response.ok {
            Ok(response.data)
        } else {
            Err(Error::rejected(
                response
                    .error
                    .unwrap_or_else(|| format!("sidecar {name} failed")),
            ))
        }
    }
}

/// Connect with linear backoff; the sidecar may still be starting.
pub async fn connect_with_retry(
    url: &str,
    request_timeout: Duration,
    attempts: u32,
) -> anyhow::Result<Arc<SidecarConnection>> {
    let mut last_err = None;
    for attempt in 1..=attempts.max(1) {
        match SidecarConnection::connect(url, request_timeout).await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                debug!(attempt, error = %e, "sidecar not reachable yet");
                last_err = Some(e);
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            },
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("sidecar connection failed")))
        .with_context(|| format!("giving up on sidecar after {attempts} attempts"))
}

fn dispatch_frame(text: &str, pending: &Pending, routes: &Routes) {
    let msg: SidecarMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "unparseable sidecar frame");
            return;
        },
    };

    if let SidecarMessage::Response(frame) = msg {
        match lock(pending).remove(&frame.request_id) {
            Some(tx) => {
                let _ = tx.send(frame);
            },
            None => debug!(request_id = %frame.request_id, "response for unknown request"),
        }
        return;
    }

    let Some((session_id, event)) = msg.into_session_event() else {
        return;
    };
    let route = lock(routes).get(&session_id).cloned();
    match route {
        Some(events) => {
            events.emit(event);
        },
        None => debug!(session_id = %session_id, event = event.name(), "event for unrouted session"),
    }
}

/// Fail every in-flight request and report every routed session as
/// disconnected.
fn on_connection_lost(pending: &Pending, routes: &Routes) {
    lock(pending).clear();
    let routes: Vec<_> = lock(routes).drain().map(|(_, r)| r).collect();
    warn!(sessions = routes.len(), "sidecar connection lost");
    for events in routes {
        events.emit(ClientEvent::Disconnected {
            reason: "sidecar connection lost".into(),
        });
    }
}
