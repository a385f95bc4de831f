//! Integration tests for live-notify.
//!
//! These tests wire the real registry, dispatcher and scheduler together with
//! an in-process status provider and a recording sender.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono_tz::Asia::Shanghai;
use live_notify::Error;
use live_notify::api::{AppState, build_router};
use live_notify::database::{init_pool, run_migrations};
use live_notify::monitor::{FetchError, RoomId, Snapshot, StatusProvider};
use live_notify::notification::{
    MessageSender, NoCover, OutgoingMessage, TemplateConfig, TemplateRenderer, TemplateSet,
};
use live_notify::services::{ALL_ROOMS_HEADER, Components, NO_ROOMS_MESSAGE, ServiceContainer};
use live_notify::subscription::{
    KeyValueStore, MemoryKvStore, SUBSCRIPTION_NAMESPACE, SqliteKvStore, SubscribeOutcome,
    SubscriptionRegistry,
};
use parking_lot::Mutex;
use rstest::rstest;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Reports whatever status was last set for a room; offline by default.
#[derive(Default)]
struct SwitchableProvider {
    rooms: Mutex<HashMap<String, Result<Snapshot, FetchError>>>,
}

impl SwitchableProvider {
    fn set(&self, room: &str, result: Result<Snapshot, FetchError>) {
        self.rooms.lock().insert(room.to_string(), result);
    }
}

#[async_trait]
impl StatusProvider for SwitchableProvider {
    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<Snapshot, FetchError> {
        self.rooms
            .lock()
            .get(room_id.as_str())
            .cloned()
            .unwrap_or_else(|| Ok(Snapshot::offline()))
    }
}

#[derive(Default)]
struct RecordingSender {
    fail_for: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    fn texts_for(&self, session: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(s, _)| s == session)
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    fn sender_type(&self) -> &'static str {
        "recording"
    }

    async fn send(&self, session_id: &str, message: &OutgoingMessage) -> live_notify::Result<()> {
        if self.fail_for.lock().iter().any(|s| s == session_id) {
            return Err(Error::delivery("endpoint rejected the message"));
        }
        self.sent
            .lock()
            .push((session_id.to_string(), message.text.clone()));
        Ok(())
    }
}

struct Harness {
    services: Arc<ServiceContainer>,
    provider: Arc<SwitchableProvider>,
    sender: Arc<RecordingSender>,
    store: Arc<MemoryKvStore>,
}

fn harness_with_templates(templates: TemplateConfig) -> Harness {
    let provider = Arc::new(SwitchableProvider::default());
    let sender = Arc::new(RecordingSender::default());
    let store = Arc::new(MemoryKvStore::new());
    let registry = Arc::new(SubscriptionRegistry::new(
        store.clone(),
        provider.clone(),
        Shanghai,
    ));

    let services = Arc::new(ServiceContainer::from_components(Components {
        registry,
        sender: sender.clone(),
        renderer: TemplateRenderer::new(TemplateSet::from_config(&templates)),
        covers: Arc::new(NoCover),
        interval: Duration::from_millis(20),
        display_tz: Shanghai,
    }));

    Harness {
        services,
        provider,
        sender,
        store,
    }
}

fn harness() -> Harness {
    harness_with_templates(TemplateConfig::default())
}

mod monitoring_tests {
    use super::*;

    #[tokio::test]
    async fn test_live_offline_live_sequence_notifies_each_edge_once() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), Some("Alice"))
            .await
            .unwrap();
        h.services
            .subscribe("B", &RoomId::from("42"), None)
            .await
            .unwrap();

        let live = || Ok(Snapshot::live(Some("2024-01-01 20:00:00")).with_title("Evening stream"));

        // Baseline while already live: silent.
        h.provider.set("42", live());
        h.services.scheduler.run_pass().await;
        h.services.scheduler.run_pass().await;
        assert!(h.sender.sent.lock().is_empty());

        h.provider.set("42", Ok(Snapshot::offline()));
        h.services.scheduler.run_pass().await;
        h.services.scheduler.run_pass().await;

        h.provider.set("42", live());
        h.services.scheduler.run_pass().await;
        h.services.scheduler.run_pass().await;

        for session in ["A", "B"] {
            let texts = h.sender.texts_for(session);
            assert_eq!(texts.len(), 2, "session {session} got {texts:?}");
            assert!(texts[0].starts_with("Alice's stream has ended"));
            assert!(texts[1].starts_with("Alice is live!"));
            assert!(texts[1].contains("Evening stream"));
        }
    }

    #[tokio::test]
    async fn test_transient_failures_do_not_look_like_offline() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), None)
            .await
            .unwrap();

        h.provider.set("42", Ok(Snapshot::live(None)));
        h.services.scheduler.run_pass().await;

        h.provider
            .set("42", Err(FetchError::Transport("timed out".to_string())));
        for _ in 0..3 {
            let report = h.services.scheduler.run_pass().await;
            assert_eq!(report.failures, 1);
        }

        h.provider.set("42", Ok(Snapshot::live(None)));
        h.services.scheduler.run_pass().await;
        assert!(h.sender.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_isolated() {
        let h = harness();
        for sid in ["A", "B"] {
            h.services
                .subscribe(sid, &RoomId::from("42"), None)
                .await
                .unwrap();
        }
        h.sender.fail_for.lock().push("A".to_string());

        h.services.scheduler.run_pass().await;
        h.provider.set("42", Ok(Snapshot::live(None)));
        h.services.scheduler.run_pass().await;

        assert!(h.sender.texts_for("A").is_empty());
        assert_eq!(h.sender.texts_for("B").len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribed_room_is_no_longer_polled() {
        let h = harness();
        let room = RoomId::from("42");
        h.services.subscribe("A", &room, None).await.unwrap();
        h.services.subscribe("B", &room, None).await.unwrap();

        h.services.unsubscribe("A", &room).await.unwrap();
        assert_eq!(h.services.scheduler.run_pass().await.checked, 1);
        assert_eq!(h.services.list_subscribers(&room).await.unwrap(), vec!["B".to_string()]);

        h.services.unsubscribe("B", &room).await.unwrap();
        assert_eq!(h.services.scheduler.run_pass().await.checked, 0);
        assert!(matches!(
            h.services.list_subscribers(&room).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_background_loop_detects_edges_and_shuts_down() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), None)
            .await
            .unwrap();

        h.services.start();
        tokio::time::sleep(Duration::from_millis(60)).await;
        h.provider.set("42", Ok(Snapshot::live(None)));
        tokio::time::sleep(Duration::from_millis(120)).await;

        tokio::time::timeout(Duration::from_secs(1), h.services.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert!(h.services.is_shutting_down());
        assert_eq!(h.sender.texts_for("A").len(), 1);
    }
}

mod query_tests {
    use super::*;

    #[tokio::test]
    async fn test_query_offline_room() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), Some("Alice"))
            .await
            .unwrap();
        h.provider
            .set("42", Ok(Snapshot::offline().with_title("Evening stream")));

        let text = h.services.query_info(Some(&RoomId::from("42"))).await.unwrap();
        assert!(text.contains("Room: 42"));
        assert!(text.contains("Anchor: Alice"));
        assert!(text.contains("Status: offline"));
        assert!(text.contains("Title: Evening stream"));
        assert!(text.contains("Link: https://live.bilibili.com/42"));
        assert!(!text.contains("unknown"));
    }

    #[tokio::test]
    async fn test_query_detects_and_dispatches_edge_once() {
        let h = harness();
        let room = RoomId::from("42");
        h.services.subscribe("A", &room, Some("Alice")).await.unwrap();

        h.services.query_info(Some(&room)).await.unwrap();
        h.provider
            .set("42", Ok(Snapshot::live(Some("2024-01-01 20:00:00"))));

        let text = h.services.query_info(Some(&room)).await.unwrap();
        assert!(text.contains("Status: live"));
        assert!(text.contains("Started: 2024-01-01 20:00:00"));
        assert_eq!(h.sender.texts_for("A").len(), 1);

        h.services.query_info(Some(&room)).await.unwrap();
        h.services.scheduler.run_pass().await;
        assert_eq!(h.sender.texts_for("A").len(), 1);
    }

    #[tokio::test]
    async fn test_query_fetch_failure() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), Some("Alice"))
            .await
            .unwrap();
        h.provider.set(
            "42",
            Err(FetchError::Provider {
                code: 60004,
                message: "room does not exist".to_string(),
            }),
        );

        let text = h.services.query_info(Some(&RoomId::from("42"))).await.unwrap();
        assert_eq!(
            text,
            "Room 42 (Alice): could not fetch live status, please try again later"
        );
    }

    #[tokio::test]
    async fn test_query_all_rooms() {
        let h = harness();
        assert_eq!(h.services.query_info(None).await.unwrap(), NO_ROOMS_MESSAGE);

        h.services
            .subscribe("A", &RoomId::from("42"), Some("Alice"))
            .await
            .unwrap();
        h.services
            .subscribe("A", &RoomId::from("7"), Some("Bob"))
            .await
            .unwrap();

        let text = h.services.query_info(None).await.unwrap();
        assert!(text.starts_with(ALL_ROOMS_HEADER));
        let alice = text.find("Anchor: Alice").unwrap();
        let bob = text.find("Anchor: Bob").unwrap();
        assert!(alice < bob);
    }

    #[tokio::test]
    async fn test_query_unknown_room() {
        let h = harness();
        assert!(matches!(
            h.services.query_info(Some(&RoomId::from("404"))).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_template_override_with_unknown_placeholder_falls_back() {
        let h = harness_with_templates(TemplateConfig {
            live_info_offline: Some("{streamer} is resting".to_string()),
            live_info_live: Some("{anchor_name} is on air for {duration}".to_string()),
            ..Default::default()
        });
        let room = RoomId::from("42");
        h.services.subscribe("A", &room, Some("Alice")).await.unwrap();

        let text = h.services.query_info(Some(&room)).await.unwrap();
        assert!(text.contains("Status: offline"));

        h.provider.set("42", Ok(Snapshot::live(None)));
        let text = h.services.query_info(Some(&room)).await.unwrap();
        assert!(text.starts_with("Alice is on air for 0h 0m"));
    }
}

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let pool = init_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKvStore::new(pool.clone(), SUBSCRIPTION_NAMESPACE));
        let provider = Arc::new(SwitchableProvider::default());

        let registry =
            SubscriptionRegistry::load(Arc::clone(&store), provider.clone(), Shanghai)
                .await
                .unwrap();
        registry
            .subscribe("A", &RoomId::from("42"), Some("Alice"))
            .await
            .unwrap();
        registry
            .subscribe("B", &RoomId::from("42"), None)
            .await
            .unwrap();
        registry
            .subscribe("B", &RoomId::from("7"), Some("Bob"))
            .await
            .unwrap();
        registry
            .subscribe("C", &RoomId::from("9"), None)
            .await
            .unwrap();
        registry.unsubscribe("C", &RoomId::from("9")).await.unwrap();

        let reloaded = SubscriptionRegistry::load(store, provider, Shanghai)
            .await
            .unwrap();
        assert_eq!(reloaded.subscriptions().await, registry.subscriptions().await);
        assert_eq!(reloaded.len().await, 2);

        let (raw,): (String,) =
            sqlx::query_as("SELECT value FROM kv_store WHERE namespace = ? AND key = ?")
                .bind(SUBSCRIPTION_NAMESPACE)
                .bind("room:42")
                .fetch_one(&pool)
                .await
                .unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"anchor_name": "Alice", "sids": ["A", "B"]}));
    }

    #[tokio::test]
    async fn test_failed_write_is_reported_and_not_applied() {
        let h = harness();
        h.store.set_fail_writes(true);

        let result = h.services.subscribe("A", &RoomId::from("42"), None).await;
        assert!(matches!(result, Err(Error::Persistence(_))));
        assert!(h.services.registry.is_empty().await);

        h.store.set_fail_writes(false);
        assert_eq!(
            h.services
                .subscribe("A", &RoomId::from("42"), None)
                .await
                .unwrap(),
            SubscribeOutcome::Added
        );
    }

    #[tokio::test]
    async fn test_seeded_rooms_are_idempotent() {
        let h = harness();
        let config = live_notify::config::AppConfig::from_toml(
            r#"
            [[rooms]]
            id = 42
            anchor_name = "Alice"
            sessions = ["A", "B"]
            "#,
        )
        .unwrap();

        assert_eq!(h.services.seed_rooms(&config.rooms).await.unwrap(), 2);
        assert_eq!(h.services.seed_rooms(&config.rooms).await.unwrap(), 0);
        assert_eq!(
            h.services.list_subscribers(&RoomId::from("42")).await.unwrap(),
            vec!["A".to_string(), "B".to_string()]
        );
    }
}

mod api_tests {
    use super::*;

    async fn call(h: &Harness, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let router = build_router(AppState::new(Arc::clone(&h.services)));
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = router.oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn json_body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[rstest]
    #[case(json!({"session_id": "A", "room_id": 42}))]
    #[case(json!({"session_id": "A", "room_id": "42", "anchor_name": "Alice"}))]
    #[tokio::test]
    async fn test_subscribe_route(#[case] body: Value) {
        let h = harness();

        let (status, bytes) = call(&h, "POST", "/api/subscriptions", Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json_body(&bytes), json!({"outcome": "added"}));

        let (status, bytes) = call(&h, "POST", "/api/subscriptions", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&bytes), json!({"outcome": "already_subscribed"}));
    }

    #[tokio::test]
    async fn test_unsubscribe_route() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), None)
            .await
            .unwrap();

        let body = json!({"session_id": "A", "room_id": "42"});
        let (status, bytes) = call(&h, "DELETE", "/api/subscriptions", Some(body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&bytes), json!({"outcome": "removed"}));

        let (status, bytes) = call(&h, "DELETE", "/api/subscriptions", Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&bytes)["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_subscribe_validation_error() {
        let h = harness();
        let (status, bytes) = call(
            &h,
            "POST",
            "/api/subscriptions",
            Some(json!({"session_id": "", "room_id": "42"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(&bytes)["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_persistence_error_is_500() {
        let h = harness();
        h.store.set_fail_writes(true);
        let (status, bytes) = call(
            &h,
            "POST",
            "/api/subscriptions",
            Some(json!({"session_id": "A", "room_id": "42"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(&bytes)["code"], "PERSISTENCE_ERROR");
    }

    #[tokio::test]
    async fn test_room_routes() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), Some("Alice"))
            .await
            .unwrap();

        let (status, bytes) = call(&h, "GET", "/api/rooms", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(bytes).unwrap().starts_with(ALL_ROOMS_HEADER));

        let (status, bytes) = call(&h, "GET", "/api/rooms/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(String::from_utf8(bytes).unwrap().contains("Anchor: Alice"));

        let (status, bytes) = call(&h, "GET", "/api/rooms/42/subscribers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&bytes), json!(["A"]));

        let (status, _) = call(&h, "GET", "/api/rooms/404", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&h, "GET", "/api/rooms/404/subscribers", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_route() {
        let h = harness();
        h.services
            .subscribe("A", &RoomId::from("42"), None)
            .await
            .unwrap();

        let (status, bytes) = call(&h, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&bytes), json!({"status": "ok", "rooms": 1}));
    }
}
