//! Drives the sidecar client against an in-process fake sidecar.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{path::PathBuf, time::Duration};

use {
    bytes::Bytes,
    futures::{SinkExt, StreamExt},
    serde_json::{Value, json},
    switchboard_channels::{
        ClientEvent, ClientEventSender, ClientFactory, ClientSpec, Error, MediaAttachment,
        MediaKind, OutboundMessage, event_channel,
    },
    switchboard_whatsapp::{SidecarClientFactory, connect_with_retry},
    tokio::{net::TcpListener, sync::mpsc},
    tokio_tungstenite::{accept_async, tungstenite::Message},
};

/// Accepts one connection and answers requests the way the real sidecar
/// would. Every request frame is forwarded to the returned receiver. Sending
/// on the returned closer drops the connection.
async fn fake_sidecar() -> (
    String,
    mpsc::UnboundedReceiver<Value>,
    mpsc::UnboundedSender<()>,
) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();
    let (close_tx, mut close_rx) = mpsc::unbounded_channel::<()>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut sink, mut reader) = ws.split();

        loop {
            tokio::select! {
                _ = close_rx.recv() => return,
                frame = reader.next() => {
                    let Some(Ok(Message::Text(text))) = frame else { return };
                    let req: Value = serde_json::from_str(text.as_str()).unwrap();
                    let _ = seen_tx.send(req.clone());
                    for reply in replies(&req) {
                        sink.send(Message::Text(reply.to_string().into())).await.unwrap();
                    }
                },
            }
        }
    });

    (url, seen_rx, close_tx)
}

fn replies(req: &Value) -> Vec<Value> {
    let request_id = req["request_id"].clone();
    let session_id = req["session_id"].clone();
    match req["type"].as_str().unwrap() {
        "init" => vec![
            json!({"type": "response", "request_id": request_id, "ok": true}),
            json!({"type": "qr", "session_id": session_id, "qr": "2@pairing"}),
            json!({"type": "authenticated", "session_id": session_id}),
            json!({"type": "ready", "session_id": session_id}),
        ],
        "check_number" => {
            let registered = req["address"].as_str().unwrap().starts_with("91");
            vec![json!({
                "type": "response", "request_id": request_id, "ok": true,
                "data": {"registered": registered},
            })]
        },
        "send" => vec![json!({
            "type": "response", "request_id": request_id, "ok": true,
            "data": {"message_id": "wamid-1"},
        })],
        "logout" => vec![json!({
            "type": "response", "request_id": request_id, "ok": false,
            "error": "session is not logged in",
        })],
        _ => vec![json!({"type": "response", "request_id": request_id, "ok": true})],
    }
}

fn spec(id: &str, generation: u64) -> (ClientSpec, mpsc::UnboundedReceiver<switchboard_channels::SessionEvent>) {
    let (tx, rx) = event_channel();
    (
        ClientSpec {
            session_id: id.into(),
            storage_path: PathBuf::from("/var/lib/switchboard/sessions").join(id),
            events: ClientEventSender::new(id, generation, tx),
        },
        rx,
    )
}

async fn next_event(
    rx: &mut mpsc::UnboundedReceiver<switchboard_channels::SessionEvent>,
) -> switchboard_channels::SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event within 5s")
        .expect("channel open")
}

#[tokio::test]
async fn init_routes_lifecycle_events_to_the_session() {
    let (url, mut seen, _close) = fake_sidecar().await;
    let conn = connect_with_retry(&url, Duration::from_secs(5), 3).await.unwrap();
    let factory = SidecarClientFactory::new(conn);

    let (spec, mut events) = spec("shop", 7);
    let client = factory.create(spec).unwrap();
    client.initialize().await.unwrap();

    let init = seen.recv().await.unwrap();
    assert_eq!(init["type"], "init");
    assert_eq!(init["session_id"], "shop");
    assert_eq!(init["generation"], 7);
    assert_eq!(init["auth_dir"], "/var/lib/switchboard/sessions/shop");

    let qr = next_event(&mut events).await;
    assert_eq!(qr.session_id, "shop");
    assert_eq!(qr.generation, 7);
    assert_eq!(qr.event, ClientEvent::Qr {
        code: "2@pairing".into()
    });
    assert_eq!(next_event(&mut events).await.event, ClientEvent::Authenticated);
    assert_eq!(next_event(&mut events).await.event, ClientEvent::Ready);
}

#[tokio::test]
async fn check_number_send_and_rejections() {
    let (url, mut seen, _close) = fake_sidecar().await;
    let conn = connect_with_retry(&url, Duration::from_secs(5), 3).await.unwrap();
    let (spec, _events) = spec("shop", 1);
    let client = SidecarClientFactory::new(conn).create(spec).unwrap();

    assert!(client.is_registered("919876543210@c.us").await.unwrap());
    assert!(!client.is_registered("12025550123@c.us").await.unwrap());
    seen.recv().await.unwrap();
    seen.recv().await.unwrap();

    let sent = client
        .send(
            "919876543210@c.us",
            OutboundMessage::Media(MediaAttachment {
                kind: MediaKind::Image,
                data: Bytes::from_static(&[0xff, 0xd8, 0xff]),
                mime_type: "image/jpeg".into(),
                filename: Some("cat.jpg".into()),
                caption: Some("meow".into()),
            }),
        )
        .await
        .unwrap();
    assert_eq!(sent.message_id.as_deref(), Some("wamid-1"));

    let frame = seen.recv().await.unwrap();
    assert_eq!(frame["type"], "send");
    assert_eq!(frame["to"], "919876543210@c.us");
    assert_eq!(frame["payload"]["kind"], "media");
    assert_eq!(frame["payload"]["media_kind"], "image");
    assert_eq!(frame["payload"]["data"], "/9j/");
    assert_eq!(frame["payload"]["caption"], "meow");

    let err = client.logout().await.unwrap_err();
    assert!(matches!(err, Error::Rejected { .. }));
    assert!(err.to_string().contains("not logged in"));
}

#[tokio::test]
async fn destroy_of_replaced_handle_names_its_own_generation() {
    let (url, mut seen, _close) = fake_sidecar().await;
    let conn = connect_with_retry(&url, Duration::from_secs(5), 3).await.unwrap();
    let factory = SidecarClientFactory::new(conn);

    let (old_spec, _old_events) = spec("shop", 1);
    let old = factory.create(old_spec).unwrap();
    let (new_spec, mut new_events) = spec("shop", 2);
    let new = factory.create(new_spec).unwrap();
    new.initialize().await.unwrap();
    assert_eq!(seen.recv().await.unwrap()["generation"], 2);

    old.destroy().await.unwrap();
    let destroy = seen.recv().await.unwrap();
    assert_eq!(destroy["type"], "destroy");
    assert_eq!(destroy["session_id"], "shop");
    assert_eq!(destroy["generation"], 1);

    // The successor's route survives the stale teardown.
    let ev = next_event(&mut new_events).await;
    assert_eq!(ev.generation, 2);
    assert!(matches!(ev.event, ClientEvent::Qr { .. }));
}

#[tokio::test]
async fn connection_loss_disconnects_routed_sessions() {
    let (url, _seen, close) = fake_sidecar().await;
    let conn = connect_with_retry(&url, Duration::from_secs(5), 3).await.unwrap();
    let factory = SidecarClientFactory::new(conn.clone());
    let (spec, mut events) = spec("shop", 3);
    let client = factory.create(spec).unwrap();
    client.initialize().await.unwrap();
    for _ in 0..3 {
        next_event(&mut events).await;
    }

    close.send(()).unwrap();
    let ev = next_event(&mut events).await;
    assert!(matches!(ev.event, ClientEvent::Disconnected { .. }));
    assert_eq!(ev.generation, 3);

    for _ in 0..100 {
        if !conn.is_connected() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!conn.is_connected());
    assert!(matches!(
        client.is_registered("919876543210@c.us").await.unwrap_err(),
        Error::Unavailable { .. }
    ));
    assert!(client.destroy().await.is_ok(), "destroy after loss is a no-op");
    assert!(factory.create(self::spec("other", 4).0).is_err());
}
