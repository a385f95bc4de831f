//! Generic webhook channel.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{MessageSender, OutgoingMessage};
use crate::{Error, Result};

/// Webhook channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`.
    #[serde(default)]
    pub bearer_token: Option<String>,
    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            bearer_token: None,
            headers: BTreeMap::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl WebhookConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::config("webhook channel requires a url"));
        }
        Ok(())
    }
}

/// Posts each message as JSON to a fixed URL.
pub struct WebhookSender {
    config: WebhookConfig,
    client: Client,
}

impl WebhookSender {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        live_platforms::default::install_rustls_provider();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build webhook client: {e}")))?;
        Ok(Self { config, client })
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in &self.config.headers {
            match (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Ignoring invalid webhook header {}", name),
            }
        }

        if let Some(token) = self.config.bearer_token.as_deref().filter(|t| !t.is_empty())
            && let Ok(value) = format!("Bearer {token}").parse()
        {
            headers.insert(AUTHORIZATION, value);
        }

        headers
    }

    fn build_payload(&self, session_id: &str, message: &OutgoingMessage) -> serde_json::Value {
        json!({
            "session_id": session_id,
            "text": message.text,
            "image_path": message.image.as_ref().map(|p| p.display().to_string()),
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl MessageSender for WebhookSender {
    fn sender_type(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, session_id: &str, message: &OutgoingMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.config.url)
            .headers(self.build_headers())
            .json(&self.build_payload(session_id, message))
            .send()
            .await
            .map_err(|e| Error::delivery(format!("webhook request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::delivery(format!("webhook failed: {status} - {body}")));
        }

        debug!("Webhook message delivered to {}", session_id);
        Ok(())
    }
}
