//! Service container.
//!
//! Wires the session, store, registry, dispatcher and scheduler together and
//! exposes the inbound commands (`subscribe`, `unsubscribe`, `query_info`).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use live_platforms::{HttpSession, SessionOptions, SessionScope};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, RoomSeed};
use crate::database::{self, DbPool};
use crate::error::{Error, Result};
use crate::monitor::{BilibiliStatusProvider, CheckOutcome, RoomId, SessionId, StatusProvider};
use crate::notification::message::{room_args, status_args};
use crate::notification::{
    CoverFetcher, HttpCoverFetcher, MessageSender, NotificationDispatcher, TemplateName,
    TemplateRenderer, TemplateSet,
};
use crate::scheduler::{PollScheduler, PollSchedulerConfig};
use crate::subscription::{
    KeyValueStore, SUBSCRIPTION_NAMESPACE, SharedMonitor, SqliteKvStore, SubscribeOutcome,
    SubscriptionRegistry, UnsubscribeOutcome,
};

/// Header of the all-rooms status query.
pub const ALL_ROOMS_HEADER: &str = "Status of all monitored rooms";

/// Reply to an all-rooms query when nothing is monitored.
pub const NO_ROOMS_MESSAGE: &str = "No rooms are being monitored.";

/// Pre-built parts for [`ServiceContainer::from_components`].
pub struct Components {
    pub registry: Arc<SubscriptionRegistry>,
    pub sender: Arc<dyn MessageSender>,
    pub renderer: TemplateRenderer,
    pub covers: Arc<dyn CoverFetcher>,
    pub interval: Duration,
    pub display_tz: Tz,
}

/// Service container holding all application services.
pub struct ServiceContainer {
    pub registry: Arc<SubscriptionRegistry>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub scheduler: Arc<PollScheduler>,
    /// Set when the container owns a database pool.
    pool: Option<DbPool>,
    /// Closes the shared HTTP session when dropped.
    session_scope: Mutex<Option<SessionScope>>,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
    display_tz: Tz,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Build every service from the configuration.
    pub async fn build(config: &AppConfig) -> Result<Self> {
        let provider_tz = config.provider_tz()?;
        let display_tz = config.display_tz()?;

        let session = Arc::new(HttpSession::new(SessionOptions {
            timeout: config.request_timeout(),
            ..Default::default()
        }));
        let scope = session.scoped();

        let pool = database::init_pool(&config.database_url).await?;
        database::run_migrations(&pool).await?;

        let store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKvStore::new(pool.clone(), SUBSCRIPTION_NAMESPACE));
        let provider: Arc<dyn StatusProvider> =
            Arc::new(BilibiliStatusProvider::new(Arc::clone(&session)));
        let registry = Arc::new(SubscriptionRegistry::load(store, provider, provider_tz).await?);

        let covers = Arc::new(
            HttpCoverFetcher::new(Arc::clone(&session), config.cover_dir.clone())
                .with_timeout(config.cover_timeout()),
        );
        let sender = config.channel.build()?;
        info!("Delivering messages via {}", sender.sender_type());

        let mut container = Self::from_components(Components {
            registry,
            sender,
            renderer: TemplateRenderer::new(TemplateSet::from_config(&config.templates)),
            covers,
            interval: config.interval(),
            display_tz,
        });
        container.pool = Some(pool);
        *container.session_scope.lock() = Some(scope);

        container.seed_rooms(&config.rooms).await?;
        Ok(container)
    }

    pub fn from_components(components: Components) -> Self {
        let Components {
            registry,
            sender,
            renderer,
            covers,
            interval,
            display_tz,
        } = components;

        let cancellation_token = CancellationToken::new();
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&registry),
            sender,
            Arc::new(renderer),
            covers,
            display_tz,
        ));
        let scheduler = Arc::new(PollScheduler::with_cancellation(
            Arc::clone(&registry),
            Arc::clone(&dispatcher),
            PollSchedulerConfig { interval },
            cancellation_token.clone(),
        ));

        Self {
            registry,
            dispatcher,
            scheduler,
            pool: None,
            session_scope: Mutex::new(None),
            scheduler_handle: Mutex::new(None),
            display_tz,
            cancellation_token,
        }
    }

    /// Subscribe every configured session. Returns how many were new.
    pub async fn seed_rooms(&self, seeds: &[RoomSeed]) -> Result<usize> {
        let mut added = 0;
        for seed in seeds {
            if seed.sessions.is_empty() {
                warn!("Configured room {} has no sessions, skipping", seed.id);
                continue;
            }
            for sid in &seed.sessions {
                let outcome = self
                    .registry
                    .subscribe(sid, &seed.id, seed.anchor_name.as_deref())
                    .await?;
                if outcome == SubscribeOutcome::Added {
                    added += 1;
                }
            }
        }
        if added > 0 {
            info!("Added {} subscriptions from configuration", added);
        }
        Ok(added)
    }

    pub async fn subscribe(
        &self,
        session_id: &str,
        room_id: &RoomId,
        anchor_name: Option<&str>,
    ) -> Result<SubscribeOutcome> {
        self.registry.subscribe(session_id, room_id, anchor_name).await
    }

    pub async fn unsubscribe(&self, session_id: &str, room_id: &RoomId) -> Result<UnsubscribeOutcome> {
        self.registry.unsubscribe(session_id, room_id).await
    }

    /// Subscribers of a registered room.
    pub async fn list_subscribers(&self, room_id: &RoomId) -> Result<Vec<SessionId>> {
        self.registry
            .subscription(room_id)
            .await
            .map(|s| s.sids)
            .ok_or_else(|| Error::not_found("room", room_id.as_str()))
    }

    /// Formatted status of one room, or of every room when `room_id` is `None`.
    ///
    /// Each queried room is checked right away; an edge found this way is
    /// dispatched like one found by the scheduler.
    pub async fn query_info(&self, room_id: Option<&RoomId>) -> Result<String> {
        if let Some(room_id) = room_id {
            let monitor = self
                .registry
                .monitor(room_id)
                .await
                .ok_or_else(|| Error::not_found("room", room_id.as_str()))?;
            return Ok(self.query_monitor(&monitor).await);
        }

        let rooms = self.registry.active_rooms().await;
        if rooms.is_empty() {
            return Ok(NO_ROOMS_MESSAGE.to_string());
        }

        let mut sections = Vec::with_capacity(rooms.len());
        for (_, monitor) in rooms {
            sections.push(self.query_monitor(&monitor).await);
        }
        Ok(format!("{ALL_ROOMS_HEADER}\n\n{}", sections.join("\n\n")))
    }

    async fn query_monitor(&self, monitor: &SharedMonitor) -> String {
        let (outcome, state) = {
            let mut monitor = monitor.lock().await;
            let outcome = monitor.check_once().await;
            (outcome, monitor.state().clone())
        };

        let renderer = self.dispatcher.renderer();
        match outcome {
            CheckOutcome::FetchFailed(_) => {
                return renderer.render(
                    TemplateName::LiveInfoFail,
                    &room_args(&state, self.display_tz),
                );
            }
            CheckOutcome::Transition(event) => {
                self.dispatcher.dispatch(&event).await;
            }
            CheckOutcome::NoChange => {}
        }

        let args = status_args(&state, Utc::now(), self.display_tz);
        if state.is_live() {
            renderer.render(TemplateName::LiveInfoLive, &args)
        } else {
            renderer.render(TemplateName::LiveInfoOffline, &args)
        }
    }

    /// Spawn the poll loop. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut handle = self.scheduler_handle.lock();
        if handle.is_some() {
            debug!("Poll scheduler already running");
            return;
        }
        *handle = Some(self.scheduler.spawn());
    }

    /// Stop polling, wait for the in-flight pass, then release the session and pool.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down services");
        self.cancellation_token.cancel();

        let handle = self.scheduler_handle.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!("Poll scheduler task ended abnormally: {}", e);
        }

        if self.session_scope.lock().take().is_some() {
            debug!("HTTP session released");
        }

        if let Some(pool) = &self.pool {
            info!("Closing database pool...");
            pool.close().await;
        }

        info!("Services shut down");
        Ok(())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn display_tz(&self) -> Tz {
        self.display_tz
    }
}
