//! Edge events emitted by room monitors.
//!
//! Events are ephemeral: produced once per genuine transition and handed to
//! the notification dispatcher, never persisted.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use super::state::{RoomId, RoomState};

/// Direction of a detected edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    NewLive,
    NewOffline,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::NewLive => "new_live",
            EdgeKind::NewOffline => "new_offline",
        }
    }
}

/// A detected offline/live transition for one room.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub room_id: RoomId,
    pub kind: EdgeKind,
    /// Room state right after the transition was applied.
    pub snapshot: RoomState,
    /// Length of the broadcast that just ended. Only set for `NewOffline`.
    pub ended_duration: Option<TimeDelta>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new_live(snapshot: RoomState, timestamp: DateTime<Utc>) -> Self {
        Self {
            room_id: snapshot.room_id.clone(),
            kind: EdgeKind::NewLive,
            snapshot,
            ended_duration: None,
            timestamp,
        }
    }

    pub fn new_offline(
        snapshot: RoomState,
        ended_duration: Option<TimeDelta>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            room_id: snapshot.room_id.clone(),
            kind: EdgeKind::NewOffline,
            snapshot,
            ended_duration,
            timestamp,
        }
    }
}
