use std::{sync::Arc, time::Duration};

use {
    switchboard_channels::{MediaAttachment, MediaKind, OutboundMessage},
    switchboard_config::DispatchConfig,
    switchboard_media::MediaFetcher,
    switchboard_sessions::{ReadySession, SessionId, SessionManager},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    intent::{IntentFields, MessageIntent},
    phone::PhonePolicy,
};

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub session_id: SessionId,
    /// Normalized destination address.
    pub to: String,
    pub message_id: Option<String>,
}

/// Routes message intents through ready sessions.
pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    media: MediaFetcher,
    phone: PhonePolicy,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<SessionManager>,
        media: MediaFetcher,
        phone: PhonePolicy,
        send_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            media,
            phone,
            send_timeout,
        }
    }

    pub fn from_config(
        sessions: Arc<SessionManager>,
        media: MediaFetcher,
        config: &DispatchConfig,
    ) -> Self {
        Self::new(
            sessions,
            media,
            PhonePolicy::from_config(config),
            Duration::from_secs(config.send_timeout_secs),
        )
    }

    /// Deliver `intent` to `destination` through session `requested`.
    ///
    /// Checks run in order: session resolves, session is `ready`,
    /// destination normalizes, destination is registered. Media is fetched
    /// only after all checks pass. No registry lock is held while the fetch
    /// or the send is in flight.
    pub async fn send(
        &self,
        requested: &str,
        destination: &str,
        intent: MessageIntent,
    ) -> Result<Delivery> {
        let session = self.sessions.ready_client(requested).await?;
        self.deliver(session, destination, intent).await
    }

    /// [`Self::send`] for a raw type tag and its fields. The tag is parsed
    /// only once the session is known to be ready.
    pub async fn send_tagged(
        &self,
        requested: &str,
        destination: &str,
        kind: &str,
        fields: IntentFields,
    ) -> Result<Delivery> {
        let session = self.sessions.ready_client(requested).await?;
        let intent = MessageIntent::parse(kind, fields)?;
        self.deliver(session, destination, intent).await
    }

    async fn deliver(
        &self,
        session: ReadySession,
        destination: &str,
        intent: MessageIntent,
    ) -> Result<Delivery> {
        let to = self.phone.normalize(destination)?;

        let registered = self
            .bounded("check_number", session.client.is_registered(&to))
            .await?;
        if !registered {
            debug!(session_id = %session.id, to = %to, "destination not registered");
            return Err(Error::Unregistered { address: to });
        }

        let message = self.build_outbound(&intent).await?;
        let kind = message.kind();
        let sent = self
            .bounded("send", session.client.send(&to, message))
            .await
            .inspect_err(|e| {
                warn!(session_id = %session.id, to = %to, kind, error = %e, "message send failed");
            })?;

        info!(
            session_id = %session.id,
            to = %to,
            kind,
            message_id = sent.message_id.as_deref().unwrap_or(""),
            "message sent"
        );
        Ok(Delivery {
            session_id: session.id,
            to,
            message_id: sent.message_id,
        })
    }

    async fn build_outbound(&self, intent: &MessageIntent) -> Result<OutboundMessage> {
        Ok(match intent {
            MessageIntent::Text { message } => OutboundMessage::text(message.as_str()),
            MessageIntent::Link { message, link } => OutboundMessage::Text {
                body: link_body(message, link),
                link_preview: true,
            },
            MessageIntent::Image { file_url, caption } => {
                self.attachment(MediaKind::Image, file_url, caption.as_deref())
                    .await?
            },
            MessageIntent::Document { file_url, caption } => {
                self.attachment(MediaKind::Document, file_url, caption.as_deref())
                    .await?
            },
            MessageIntent::Audio { file_url } => {
                self.attachment(MediaKind::Voice, file_url, None).await?
            },
            MessageIntent::Video { file_url, caption } => {
                self.attachment(MediaKind::Video, file_url, caption.as_deref())
                    .await?
            },
        })
    }

    async fn attachment(
        &self,
        kind: MediaKind,
        file_url: &str,
        caption: Option<&str>,
    ) -> Result<OutboundMessage> {
        let fetched = self.media.fetch(file_url).await?;
        Ok(OutboundMessage::Media(MediaAttachment {
            kind,
            data: fetched.data,
            mime_type: fetched.mime_type,
            filename: fetched.filename,
            caption: caption.map(str::to_string),
        }))
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = switchboard_channels::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.send_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(switchboard_channels::Error::timeout(
                operation,
                self.send_timeout.as_secs(),
            )
            .into()),
        }
    }
}

/// The link is appended unless the message already contains it.
fn link_body(message: &str, link: &str) -> String {
    if message.contains(link) {
        message.to_string()
    } else {
        format!("{message}\n{link}")
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{Router, http::header, routing::get},
        switchboard_channels::{ClientEvent, ClientFactory, testing::FakeFactory},
        switchboard_sessions::{
            AliasTable, Error as SessionError, SessionRegistry, SessionState, SessionStorage,
        },
        tokio::net::TcpListener,
    };

    struct Fixture {
        dispatcher: Dispatcher,
        manager: Arc<SessionManager>,
        factory: Arc<FakeFactory>,
        media_base: String,
        _tmp: tempfile::TempDir,
    }

    async fn media_server() -> String {
        let app = Router::new()
            .route(
                "/cat.jpg",
                get(|| async { ([(header::CONTENT_TYPE, "image/jpeg")], vec![0xffu8, 0xd8]) }),
            )
            .route(
                "/note.ogg",
                get(|| async { ([(header::CONTENT_TYPE, "audio/ogg")], vec![1u8; 8]) }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let factory = Arc::new(FakeFactory::new());
        let manager = SessionManager::new(
            Arc::new(SessionRegistry::new(AliasTable::default())),
            Arc::clone(&factory) as Arc<dyn ClientFactory>,
            SessionStorage::new(tmp.path()),
            Duration::from_secs(60),
        );
        let media = MediaFetcher::new(1024 * 1024, Duration::from_secs(5)).unwrap();
        let dispatcher = Dispatcher::new(
            Arc::clone(&manager),
            media,
            PhonePolicy::default(),
            Duration::from_secs(5),
        );
        Fixture {
            dispatcher,
            manager,
            factory,
            media_base: media_server().await,
            _tmp: tmp,
        }
    }

    impl Fixture {
        async fn ready_session(&self, name: &str) -> String {
            let id = self.manager.create(name).await.unwrap().id.to_string();
            self.factory.emit(&id, ClientEvent::Authenticated);
            self.factory.emit(&id, ClientEvent::Ready);
            for _ in 0..100 {
                if self.manager.ready_client(name).await.is_ok() {
                    return id;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            panic!("session {name} never became ready");
        }
    }

    #[tokio::test]
    async fn unknown_session_fails_resolution() {
        let fx = fixture().await;
        let err = fx
            .dispatcher
            .send("ghost", "9876543210", MessageIntent::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotFound { .. })));
    }

    #[tokio::test]
    async fn tagged_send_checks_session_before_type() {
        let fx = fixture().await;
        let err = fx
            .dispatcher
            .send_tagged("ghost", "9876543210", "sticker", IntentFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotFound { .. })));

        fx.manager.create("pending").await.unwrap();
        let err = fx
            .dispatcher
            .send_tagged("pending", "9876543210", "sticker", IntentFields::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotReady { .. })));

        fx.ready_session("shop").await;
        let err = fx
            .dispatcher
            .send_tagged("shop", "9876543210", "sticker", IntentFields::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported message type: sticker");
    }

    #[tokio::test]
    async fn pending_session_reports_its_state() {
        let fx = fixture().await;
        fx.manager.create("pending").await.unwrap();
        let err = fx
            .dispatcher
            .send("pending", "9876543210", MessageIntent::text("hi"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::NotReady {
                state: SessionState::Initializing,
                ..
            })
        ));
        assert!(err.to_string().contains("initializing"));
    }

    #[tokio::test]
    async fn sends_text_to_normalized_address() {
        let fx = fixture().await;
        let id = fx.ready_session("shop@example.com").await;

        let delivery = fx
            .dispatcher
            .send("shop@example.com", "98765 43210", MessageIntent::text("hello"))
            .await
            .unwrap();
        assert_eq!(delivery.to, "919876543210@c.us");
        assert_eq!(delivery.session_id.as_str(), id);
        assert!(delivery.message_id.is_some());

        let sent = fx.factory.client(&id).unwrap().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "919876543210@c.us");
        assert!(matches!(
            &sent[0].1,
            OutboundMessage::Text { body, link_preview: false } if body == "hello"
        ));
    }

    #[tokio::test]
    async fn rejects_short_and_unregistered_destinations() {
        let fx = fixture().await;
        fx.ready_session("s").await;
        fx.factory.set_registered(["919876543210@c.us"]);

        assert!(matches!(
            fx.dispatcher
                .send("s", "123", MessageIntent::text("x"))
                .await
                .unwrap_err(),
            Error::InvalidPhone { .. }
        ));

        // Media is never fetched for an unregistered destination.
        let intent = MessageIntent::Image {
            file_url: "http://127.0.0.1:9/never.png".into(),
            caption: None,
        };
        let err = fx
            .dispatcher
            .send("s", "12025550123", intent)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Unregistered { ref address } if address == "12025550123@c.us")
        );
    }

    #[tokio::test]
    async fn link_is_sent_as_text_with_preview() {
        let fx = fixture().await;
        let id = fx.ready_session("s").await;
        fx.dispatcher
            .send("s", "9876543210", MessageIntent::Link {
                message: "Read this".into(),
                link: "https://example.com/post".into(),
            })
            .await
            .unwrap();

        let sent = fx.factory.client(&id).unwrap().sent();
        assert!(matches!(
            &sent[0].1,
            OutboundMessage::Text { body, link_preview: true }
                if body == "Read this\nhttps://example.com/post"
        ));
    }

    #[tokio::test]
    async fn media_intents_fetch_then_send() {
        let fx = fixture().await;
        let id = fx.ready_session("s").await;

        fx.dispatcher
            .send("s", "9876543210", MessageIntent::Image {
                file_url: format!("{}/cat.jpg", fx.media_base),
                caption: Some("meow".into()),
            })
            .await
            .unwrap();
        fx.dispatcher
            .send("s", "9876543210", MessageIntent::Audio {
                file_url: format!("{}/note.ogg", fx.media_base),
            })
            .await
            .unwrap();

        let sent = fx.factory.client(&id).unwrap().sent();
        let OutboundMessage::Media(image) = &sent[0].1 else {
            panic!("expected media, got {:?}", sent[0].1);
        };
        assert_eq!(image.kind, MediaKind::Image);
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.filename.as_deref(), Some("cat.jpg"));
        assert_eq!(image.caption.as_deref(), Some("meow"));

        let OutboundMessage::Media(voice) = &sent[1].1 else {
            panic!("expected media, got {:?}", sent[1].1);
        };
        assert_eq!(voice.kind, MediaKind::Voice);
    }

    #[tokio::test]
    async fn fetch_failure_fails_request_without_sending() {
        let fx = fixture().await;
        let id = fx.ready_session("s").await;
        let err = fx
            .dispatcher
            .send("s", "9876543210", MessageIntent::Document {
                file_url: format!("{}/missing.pdf", fx.media_base),
                caption: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch(switchboard_media::Error::Status { status: 404, .. })
        ));
        assert!(fx.factory.client(&id).unwrap().sent().is_empty());
    }

    #[tokio::test]
    async fn client_send_failure_is_passed_through() {
        let fx = fixture().await;
        fx.ready_session("s").await;
        fx.factory.fail_send(true);
        let err = fx
            .dispatcher
            .send("s", "9876543210", MessageIntent::text("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Client(_)));
        assert!(err.to_string().contains("send refused"));
    }
}
