//! Telegram Bot API channel.
//!
//! The session id is used as the chat id. Messages with an image go through
//! `sendPhoto` with the text as caption, everything else through `sendMessage`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{MessageSender, OutgoingMessage};
use crate::{Error, Result};

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Telegram photo caption limit.
const TELEGRAM_CAPTION_LIMIT: usize = 1024;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// `HTML`, `Markdown` or `MarkdownV2`. Plain text when unset.
    #[serde(default)]
    pub parse_mode: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_api_base(),
            parse_mode: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl TelegramConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(Error::config("telegram channel requires a bot_token"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::config("telegram timeout_secs must be greater than zero"));
        }
        Ok(())
    }
}

pub struct TelegramSender {
    config: TelegramConfig,
    client: Client,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        live_platforms::default::install_rustls_provider();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build telegram client: {e}")))?;
        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": truncate_message(text, TELEGRAM_MESSAGE_LIMIT),
        });
        if let Some(mode) = &self.config.parse_mode {
            payload["parse_mode"] = json!(mode);
        }

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::delivery(format!("Telegram request failed: {e}")))?;
        check_response("sendMessage", response).await
    }

    async fn send_photo(&self, chat_id: &str, caption: &str, photo: Vec<u8>) -> Result<()> {
        let part = Part::bytes(photo)
            .file_name("cover.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| Error::delivery(format!("invalid photo part: {e}")))?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", truncate_message(caption, TELEGRAM_CAPTION_LIMIT))
            .part("photo", part);
        if let Some(mode) = &self.config.parse_mode {
            form = form.text("parse_mode", mode.clone());
        }

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::delivery(format!("Telegram request failed: {e}")))?;
        check_response("sendPhoto", response).await
    }
}

async fn check_response(method: &str, response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::delivery(format!("Telegram {method} failed: {status} - {body}")))
}

async fn read_image(path: &Path) -> Option<Vec<u8>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Cannot read image {}: {}, sending text only", path.display(), e);
            None
        }
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    fn sender_type(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, session_id: &str, message: &OutgoingMessage) -> Result<()> {
        let photo = match &message.image {
            Some(path) => read_image(path).await,
            None => None,
        };

        match photo {
            Some(photo) => self.send_photo(session_id, &message.text, photo).await?,
            None => self.send_message(session_id, &message.text).await?,
        }

        debug!("Telegram message delivered to {}", session_id);
        Ok(())
    }
}

/// Truncate a message to fit within a Telegram character limit.
fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let suffix = "\n\n[truncated]";
    let keep = limit.saturating_sub(suffix.chars().count());
    let truncated: String = text.chars().take(keep).collect();
    format!("{truncated}{suffix}")
}
