//! Room to subscriber registry.
//!
//! The registry owns the lifecycle of every [`RoomMonitor`]: a monitor exists
//! exactly while its room has at least one subscriber. Every mutation is
//! written to the [`KeyValueStore`] first and only applied in memory once the
//! write succeeded.
//!
//! Store layout:
//! - `rooms`: ordered list of room ids (registration order)
//! - `room:{id}`: `{"anchor_name": ..., "sids": [...]}`

use std::collections::HashMap;
use std::sync::Arc;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::store::{KeyValueStore, StoreError};
use crate::error::{Error, Result};
use crate::monitor::{RoomId, RoomMonitor, SessionId, StatusProvider};

const INDEX_KEY: &str = "rooms";

fn room_key(room_id: &RoomId) -> String {
    format!("room:{room_id}")
}

fn persist_err(e: StoreError) -> Error {
    Error::persistence(e.to_string())
}

/// Monitor handle shared between the scheduler and query callers.
pub type SharedMonitor = Arc<Mutex<RoomMonitor>>;

/// Persisted subscription entry for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub anchor_name: String,
    /// Subscriber sessions, unique, in subscription order.
    pub sids: Vec<SessionId>,
}

impl Subscription {
    pub fn contains(&self, session_id: &str) -> bool {
        self.sids.iter().any(|s| s == session_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscribeOutcome {
    Added,
    AlreadySubscribed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsubscribeOutcome {
    Removed,
    NotFound,
}

struct RoomEntry {
    subscription: Subscription,
    monitor: SharedMonitor,
}

#[derive(Default)]
struct Inner {
    order: Vec<RoomId>,
    rooms: HashMap<RoomId, RoomEntry>,
}

impl Inner {
    fn index_value(order: &[RoomId]) -> Value {
        json!(order)
    }
}

pub struct SubscriptionRegistry {
    store: Arc<dyn KeyValueStore>,
    provider: Arc<dyn StatusProvider>,
    provider_tz: Tz,
    inner: Mutex<Inner>,
}

impl SubscriptionRegistry {
    /// Create an empty registry without reading the store.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn StatusProvider>,
        provider_tz: Tz,
    ) -> Self {
        Self {
            store,
            provider,
            provider_tz,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Build a registry from the persisted subscription map.
    pub async fn load(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn StatusProvider>,
        provider_tz: Tz,
    ) -> Result<Self> {
        let registry = Self::new(store, provider, provider_tz);
        {
            let mut inner = registry.inner.lock().await;
            let index = registry
                .store
                .get_or(INDEX_KEY, json!([]))
                .await
                .map_err(persist_err)?;
            let entries = match index {
                Value::Array(entries) => entries,
                other => {
                    warn!("Room index is not a list ({}), starting empty", other);
                    Vec::new()
                }
            };

            for raw_id in entries {
                let room_id = match serde_json::from_value::<RoomId>(raw_id.clone()) {
                    Ok(id) if !id.is_empty() => id,
                    Ok(_) => {
                        warn!("Room index holds an empty id, skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!("Room index holds invalid id {}: {}, skipping", raw_id, e);
                        continue;
                    }
                };
                if inner.rooms.contains_key(&room_id) {
                    continue;
                }
                let Some(value) = registry
                    .store
                    .get(&room_key(&room_id))
                    .await
                    .map_err(persist_err)?
                else {
                    warn!("Room {} is indexed but has no subscription entry, skipping", room_id);
                    continue;
                };

                let mut subscription: Subscription = match serde_json::from_value(value) {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        warn!("Room {} has a malformed subscription entry: {}, skipping", room_id, e);
                        continue;
                    }
                };
                let mut seen = Vec::with_capacity(subscription.sids.len());
                subscription.sids.retain(|sid| {
                    let fresh = !seen.contains(sid);
                    if fresh {
                        seen.push(sid.clone());
                    }
                    fresh
                });
                if subscription.sids.is_empty() {
                    warn!("Room {} has no subscribers, skipping", room_id);
                    continue;
                }

                let monitor = registry.new_monitor(&room_id, &subscription.anchor_name);
                inner.order.push(room_id.clone());
                inner.rooms.insert(
                    room_id,
                    RoomEntry {
                        subscription,
                        monitor,
                    },
                );
            }
            info!("Loaded {} monitored rooms", inner.order.len());
        }
        Ok(registry)
    }

    fn new_monitor(&self, room_id: &RoomId, anchor_name: &str) -> SharedMonitor {
        Arc::new(Mutex::new(RoomMonitor::new(
            room_id.clone(),
            anchor_name,
            Arc::clone(&self.provider),
            self.provider_tz,
        )))
    }

    /// Subscribe `session_id` to `room_id`, creating the room if it is new.
    ///
    /// `anchor_name` is only used for new rooms and defaults to the room id.
    pub async fn subscribe(
        &self,
        session_id: &str,
        room_id: &RoomId,
        anchor_name: Option<&str>,
    ) -> Result<SubscribeOutcome> {
        if session_id.trim().is_empty() {
            return Err(Error::validation("session id must not be empty"));
        }
        if room_id.is_empty() {
            return Err(Error::validation("room id must not be empty"));
        }

        let mut inner = self.inner.lock().await;

        if let Some(entry) = inner.rooms.get(room_id) {
            if entry.subscription.contains(session_id) {
                return Ok(SubscribeOutcome::AlreadySubscribed);
            }
            let mut updated = entry.subscription.clone();
            updated.sids.push(session_id.to_string());
            self.store
                .put(&room_key(room_id), serde_json::to_value(&updated)?)
                .await
                .map_err(persist_err)?;

            if let Some(entry) = inner.rooms.get_mut(room_id) {
                entry.subscription = updated;
            }
            info!("Session {} subscribed to room {}", session_id, room_id);
            return Ok(SubscribeOutcome::Added);
        }

        let anchor_name = anchor_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| room_id.to_string());
        let subscription = Subscription {
            anchor_name,
            sids: vec![session_id.to_string()],
        };

        let mut order = inner.order.clone();
        order.push(room_id.clone());

        self.store
            .put(&room_key(room_id), serde_json::to_value(&subscription)?)
            .await
            .map_err(persist_err)?;
        if let Err(e) = self.store.put(INDEX_KEY, Inner::index_value(&order)).await {
            if let Err(cleanup) = self.store.delete(&room_key(room_id)).await {
                debug!("Failed to clean up entry for room {}: {}", room_id, cleanup);
            }
            return Err(persist_err(e));
        }

        let monitor = self.new_monitor(room_id, &subscription.anchor_name);
        inner.order = order;
        inner.rooms.insert(
            room_id.clone(),
            RoomEntry {
                subscription,
                monitor,
            },
        );
        info!("Session {} subscribed to new room {}", session_id, room_id);
        Ok(SubscribeOutcome::Added)
    }

    /// Remove `session_id` from `room_id`. The last subscriber takes the room with it.
    pub async fn unsubscribe(&self, session_id: &str, room_id: &RoomId) -> Result<UnsubscribeOutcome> {
        let mut inner = self.inner.lock().await;

        let Some(entry) = inner.rooms.get(room_id) else {
            return Ok(UnsubscribeOutcome::NotFound);
        };
        if !entry.subscription.contains(session_id) {
            return Ok(UnsubscribeOutcome::NotFound);
        }

        let mut updated = entry.subscription.clone();
        updated.sids.retain(|sid| sid != session_id);

        if updated.sids.is_empty() {
            let order: Vec<RoomId> = inner
                .order
                .iter()
                .filter(|id| *id != room_id)
                .cloned()
                .collect();
            self.store
                .put(INDEX_KEY, Inner::index_value(&order))
                .await
                .map_err(persist_err)?;
            // The index no longer references the entry, a leftover is skipped on load.
            if let Err(e) = self.store.delete(&room_key(room_id)).await {
                warn!("Failed to delete entry for room {}: {}", room_id, e);
            }

            inner.order = order;
            inner.rooms.remove(room_id);
            info!(
                "Session {} unsubscribed from room {}, room is no longer monitored",
                session_id, room_id
            );
            return Ok(UnsubscribeOutcome::Removed);
        }

        self.store
            .put(&room_key(room_id), serde_json::to_value(&updated)?)
            .await
            .map_err(persist_err)?;
        if let Some(entry) = inner.rooms.get_mut(room_id) {
            entry.subscription = updated;
        }
        info!("Session {} unsubscribed from room {}", session_id, room_id);
        Ok(UnsubscribeOutcome::Removed)
    }

    /// Current subscribers of a room, empty when the room is unknown.
    pub async fn list_subscribers(&self, room_id: &RoomId) -> Vec<SessionId> {
        self.inner
            .lock()
            .await
            .rooms
            .get(room_id)
            .map(|entry| entry.subscription.sids.clone())
            .unwrap_or_default()
    }

    pub async fn subscription(&self, room_id: &RoomId) -> Option<Subscription> {
        self.inner
            .lock()
            .await
            .rooms
            .get(room_id)
            .map(|entry| entry.subscription.clone())
    }

    /// All subscriptions in registration order.
    pub async fn subscriptions(&self) -> Vec<(RoomId, Subscription)> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| {
                inner
                    .rooms
                    .get(id)
                    .map(|entry| (id.clone(), entry.subscription.clone()))
            })
            .collect()
    }

    /// Rooms to poll, in registration order.
    pub async fn active_rooms(&self) -> Vec<(RoomId, SharedMonitor)> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| {
                inner
                    .rooms
                    .get(id)
                    .map(|entry| (id.clone(), Arc::clone(&entry.monitor)))
            })
            .collect()
    }

    pub async fn monitor(&self, room_id: &RoomId) -> Option<SharedMonitor> {
        self.inner
            .lock()
            .await
            .rooms
            .get(room_id)
            .map(|entry| Arc::clone(&entry.monitor))
    }

    pub async fn contains(&self, room_id: &RoomId) -> bool {
        self.inner.lock().await.rooms.contains_key(room_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
