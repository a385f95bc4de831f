//! Cover image downloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use live_platforms::HttpSession;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::monitor::RoomId;

pub const DEFAULT_COVER_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait CoverFetcher: Send + Sync {
    /// Download `url` for `room_id`. `None` when no image could be produced.
    async fn fetch(&self, url: &str, room_id: &RoomId) -> Option<PathBuf>;
}

/// Saves covers to `{dir}/{room_id}.jpg` using the shared HTTP session.
pub struct HttpCoverFetcher {
    session: Arc<HttpSession>,
    dir: PathBuf,
    timeout: Duration,
}

impl HttpCoverFetcher {
    pub fn new(session: Arc<HttpSession>, dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            dir: dir.into(),
            timeout: DEFAULT_COVER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn cover_path(&self, room_id: &RoomId) -> PathBuf {
        self.dir.join(format!("{room_id}.jpg"))
    }

    async fn download(&self, url: &str, room_id: &RoomId) -> Result<PathBuf> {
        let client = self
            .session
            .client()
            .map_err(|e| Error::Other(format!("HTTP session unavailable: {e}")))?;

        let response = client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Other(format!("cover request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Other(format!(
                "cover request returned {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Other(format!("cover download failed: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.cover_path(room_id);
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }
}

#[async_trait]
impl CoverFetcher for HttpCoverFetcher {
    async fn fetch(&self, url: &str, room_id: &RoomId) -> Option<PathBuf> {
        if url.trim().is_empty() {
            debug!("Room {} has no cover url", room_id);
            return None;
        }

        match self.download(url, room_id).await {
            Ok(path) => {
                debug!("Saved cover for room {} to {}", room_id, path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to fetch cover for room {}: {}", room_id, e);
                None
            }
        }
    }
}

/// A fetcher that never produces an image.
pub struct NoCover;

#[async_trait]
impl CoverFetcher for NoCover {
    async fn fetch(&self, _url: &str, _room_id: &RoomId) -> Option<PathBuf> {
        None
    }
}
