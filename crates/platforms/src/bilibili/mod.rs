//! Bilibili live room status.
//!
//! Status comes from two public endpoints:
//! - `room_init` is authoritative for `live_status` and resolves short ids;
//! - `get_info` adds the title, cover and the formatted start time. It is
//!   best-effort, a failure there keeps the previous title and cover.

mod models;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

pub use models::{RoomInitData, RoomInfoData};

use crate::error::ExtractorError;
use crate::session::HttpSession;
use models::parse_envelope;

pub const DEFAULT_API_BASE: &str = "https://api.live.bilibili.com";

const LIVE_STATUS_LIVE: i64 = 1;

/// Public page of a live room.
pub fn room_url(room_id: &str) -> String {
    format!("https://live.bilibili.com/{room_id}")
}

/// Point-in-time status of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSnapshot {
    /// The id the caller asked about.
    pub room_id: String,
    /// The long room id, which differs when `room_id` is a short id.
    pub real_room_id: u64,
    /// Raw platform status: 0 offline, 1 live, 2 rotation (replays).
    pub live_status: i64,
    /// Start time as returned by the platform.
    pub live_time: Option<String>,
    pub title: Option<String>,
    pub cover_url: Option<String>,
}

impl RoomSnapshot {
    pub fn is_live(&self) -> bool {
        self.live_status == LIVE_STATUS_LIVE
    }

    pub(crate) fn from_parts(room_id: &str, init: RoomInitData, info: Option<RoomInfoData>) -> Self {
        let info_live_time = info
            .as_ref()
            .map(|i| i.live_time.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let live_time = info_live_time.or_else(|| raw_live_time(&init.live_time));

        Self {
            room_id: room_id.to_string(),
            real_room_id: init.room_id,
            live_status: init.live_status,
            live_time,
            title: info.as_ref().map(|i| i.title.clone()),
            cover_url: info.map(|i| i.user_cover),
        }
    }
}

fn raw_live_time(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.as_i64().is_some_and(|v| v > 0) => Some(n.to_string()),
        _ => None,
    }
}

/// Client for the bilibili live room API.
#[derive(Clone)]
pub struct BilibiliLive {
    session: Arc<HttpSession>,
    api_base: String,
}

impl BilibiliLive {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self::with_api_base(session, DEFAULT_API_BASE)
    }

    pub fn with_api_base(session: Arc<HttpSession>, api_base: impl Into<String>) -> Self {
        Self {
            session,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ExtractorError> {
        let mut url = Url::parse(&format!("{}{}", self.api_base, path))
            .map_err(|e| ExtractorError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn get_json(&self, url: Url) -> Result<Value, ExtractorError> {
        let client = self.session.client()?;
        let body = client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(body)
    }

    pub async fn room_init(&self, room_id: &str) -> Result<RoomInitData, ExtractorError> {
        validate_room_id(room_id)?;
        let url = self.endpoint("/room/v1/Room/room_init", &[("id", room_id)])?;
        parse_envelope(self.get_json(url).await?)
    }

    pub async fn room_info(&self, room_id: &str) -> Result<RoomInfoData, ExtractorError> {
        validate_room_id(room_id)?;
        let url = self.endpoint("/room/v1/Room/get_info", &[("room_id", room_id)])?;
        parse_envelope(self.get_json(url).await?)
    }

    /// Fetch the current status of a room.
    pub async fn fetch_room(&self, room_id: &str) -> Result<RoomSnapshot, ExtractorError> {
        let init = self.room_init(room_id).await?;

        let info = match self.room_info(room_id).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("Failed to get details for room {}: {}", room_id, e);
                None
            }
        };

        let snapshot = RoomSnapshot::from_parts(room_id, init, info);
        debug!(
            "Room {} status={} live_time={:?}",
            room_id, snapshot.live_status, snapshot.live_time
        );
        Ok(snapshot)
    }
}

fn validate_room_id(room_id: &str) -> Result<(), ExtractorError> {
    if room_id.is_empty() || !room_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ExtractorError::InvalidRoomId(room_id.to_string()));
    }
    Ok(())
}
