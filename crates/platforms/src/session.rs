//! Shared HTTP session.
//!
//! A single `reqwest::Client` is shared by every room fetch and cover download.
//! It is created lazily, can be closed explicitly, and is rebuilt transparently
//! when used after being closed.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use tracing::debug;

use crate::default::{BILIBILI_REFERER, DEFAULT_TIMEOUT, DEFAULT_UA, create_client_builder};
use crate::error::ExtractorError;

/// Options used whenever the underlying client is (re)built.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub user_agent: String,
    pub referer: String,
    /// Whole-request timeout. Zero disables it.
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_UA.to_string(),
            referer: BILIBILI_REFERER.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct HttpSession {
    options: SessionOptions,
    client: Mutex<Option<Client>>,
}

impl HttpSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            client: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Get the shared client, building it if the session is not open.
    pub fn client(&self) -> Result<Client, ExtractorError> {
        let mut guard = self.client.lock();
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let mut builder = create_client_builder(&self.options.user_agent, &self.options.referer);
        if self.options.timeout > Duration::ZERO {
            builder = builder.timeout(self.options.timeout);
        }
        let client = builder.build()?;
        debug!("HTTP session opened");
        *guard = Some(client.clone());
        Ok(client)
    }

    pub fn is_open(&self) -> bool {
        self.client.lock().is_some()
    }

    /// Close the session. Returns `true` if it was open.
    ///
    /// Requests already holding a clone of the client run to completion.
    pub fn close(&self) -> bool {
        let closed = self.client.lock().take().is_some();
        if closed {
            debug!("HTTP session closed");
        }
        closed
    }

    /// Tie the session's lifetime to a scope: the returned guard closes it on drop.
    pub fn scoped(self: &Arc<Self>) -> SessionScope {
        SessionScope {
            session: Arc::clone(self),
        }
    }
}

impl Default for HttpSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

/// Closes the wrapped session when dropped.
pub struct SessionScope {
    session: Arc<HttpSession>,
}

impl SessionScope {
    pub fn session(&self) -> &Arc<HttpSession> {
        &self.session
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        self.session.close();
    }
}
