//! Per-room state.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Title shown until the platform reports one.
pub const DEFAULT_ROOM_TITLE: &str = "Untitled";

/// Opaque notification target. The monitor never interprets it.
pub type SessionId = String;

/// Identifier of a broadcast room, stable across restarts.
///
/// Accepts both numbers and strings when deserialized, always stored as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<u64> for RoomId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => RoomId::from(n),
            Raw::Text(s) => RoomId::new(s),
        })
    }
}

/// Broadcast status as last observed by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    /// No observation yet.
    Unknown,
    Live,
    Offline,
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveStatus::Unknown => write!(f, "unknown"),
            LiveStatus::Live => write!(f, "live"),
            LiveStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Everything known about one room.
///
/// `live_start_time` is set exactly when `status` is `Live`, and `status`
/// never returns to `Unknown` after the first observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomState {
    pub room_id: RoomId,
    pub anchor_name: String,
    pub status: LiveStatus,
    pub last_check_time: Option<DateTime<Utc>>,
    pub live_start_time: Option<DateTime<Utc>>,
    /// Whether the current live period has been announced (or baselined).
    pub has_fired_live_edge: bool,
    pub room_title: String,
    pub cover_url: String,
}

impl RoomState {
    pub fn new(room_id: RoomId, anchor_name: impl Into<String>) -> Self {
        Self {
            room_id,
            anchor_name: anchor_name.into(),
            status: LiveStatus::Unknown,
            last_check_time: None,
            live_start_time: None,
            has_fired_live_edge: false,
            room_title: DEFAULT_ROOM_TITLE.to_string(),
            cover_url: String::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == LiveStatus::Live
    }

    pub fn room_url(&self) -> String {
        live_platforms::room_url(self.room_id.as_str())
    }

    /// How long the current broadcast has been running at `now`.
    pub fn live_duration(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        match (self.status, self.live_start_time) {
            (LiveStatus::Live, Some(start)) => Some(now - start),
            _ => None,
        }
    }
}

/// Render a duration as `{h}h {m}m {s}s`. Negative values clamp to zero.
pub fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}
