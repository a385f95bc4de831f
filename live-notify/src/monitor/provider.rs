//! Status provider seam.
//!
//! The monitor only sees [`Snapshot`]s; how they are fetched is up to the
//! [`StatusProvider`] implementation.

use std::sync::Arc;

use async_trait::async_trait;
use live_platforms::{BilibiliLive, ExtractorError, HttpSession, RoomSnapshot};
use thiserror::Error;

use super::state::RoomId;

/// Observed broadcast status in one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedStatus {
    Live,
    Offline,
}

/// One fetched status result for a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub status: ObservedStatus,
    /// Start time exactly as the provider formatted it.
    pub live_time_raw: Option<String>,
    /// `None` when the provider could not supply it this time.
    pub title: Option<String>,
    pub cover_url: Option<String>,
}

impl Snapshot {
    pub fn live(live_time_raw: Option<&str>) -> Self {
        Self {
            status: ObservedStatus::Live,
            live_time_raw: live_time_raw.map(str::to_string),
            title: None,
            cover_url: None,
        }
    }

    pub fn offline() -> Self {
        Self {
            status: ObservedStatus::Offline,
            live_time_raw: None,
            title: None,
            cover_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_cover(mut self, cover_url: impl Into<String>) -> Self {
        self.cover_url = Some(cover_url.into());
        self
    }
}

impl From<RoomSnapshot> for Snapshot {
    fn from(room: RoomSnapshot) -> Self {
        let status = if room.is_live() {
            ObservedStatus::Live
        } else {
            ObservedStatus::Offline
        };
        Self {
            status,
            live_time_raw: room.live_time,
            title: room.title,
            cover_url: room.cover_url,
        }
    }
}

/// A fetch produced no usable information this cycle.
///
/// This is never an offline observation: the room state stays untouched and
/// the next scheduled poll retries.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("provider returned code {code}: {message}")]
    Provider { code: i64, message: String },
}

impl From<ExtractorError> for FetchError {
    fn from(err: ExtractorError) -> Self {
        match err {
            ExtractorError::ApiError { code, message } => FetchError::Provider { code, message },
            ExtractorError::HttpError(e) => FetchError::Transport(e.to_string()),
            other => FetchError::Malformed(other.to_string()),
        }
    }
}

#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<Snapshot, FetchError>;
}

/// [`StatusProvider`] backed by the bilibili live API.
pub struct BilibiliStatusProvider {
    api: BilibiliLive,
}

impl BilibiliStatusProvider {
    pub fn new(session: Arc<HttpSession>) -> Self {
        Self {
            api: BilibiliLive::new(session),
        }
    }

    pub fn with_api(api: BilibiliLive) -> Self {
        Self { api }
    }
}

#[async_trait]
impl StatusProvider for BilibiliStatusProvider {
    async fn fetch_snapshot(&self, room_id: &RoomId) -> Result<Snapshot, FetchError> {
        let room = self.api.fetch_room(room_id.as_str()).await?;
        Ok(room.into())
    }
}
