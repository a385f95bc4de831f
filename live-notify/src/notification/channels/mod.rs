//! Message delivery channels.
//!
//! - Log output (dry runs)
//! - Generic webhooks (HTTP POST)
//! - Telegram Bot API, using the session id as chat id

mod log;
mod telegram;
mod webhook;

pub use log::LogSender;
pub use telegram::{TelegramConfig, TelegramSender};
pub use webhook::{WebhookConfig, WebhookSender};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A rendered message addressed to one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub text: String,
    /// Local image to attach, if any.
    pub image: Option<PathBuf>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: PathBuf) -> Self {
        self.image = Some(image);
        self
    }
}

/// Delivers messages to opaque session ids.
#[async_trait]
pub trait MessageSender: Send + Sync {
    fn sender_type(&self) -> &'static str;

    /// Deliver one message. Failures are `Error::Delivery` and are never retried.
    async fn send(&self, session_id: &str, message: &OutgoingMessage) -> Result<()>;
}

/// Channel configuration wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    #[default]
    Log,
    Webhook(WebhookConfig),
    Telegram(TelegramConfig),
}

impl ChannelConfig {
    pub fn channel_type(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Webhook(_) => "webhook",
            Self::Telegram(_) => "telegram",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Log => Ok(()),
            Self::Webhook(c) => c.validate(),
            Self::Telegram(c) => c.validate(),
        }
    }

    pub fn build(&self) -> Result<Arc<dyn MessageSender>> {
        Ok(match self {
            Self::Log => Arc::new(LogSender),
            Self::Webhook(c) => Arc::new(WebhookSender::new(c.clone())?),
            Self::Telegram(c) => Arc::new(TelegramSender::new(c.clone())?),
        })
    }
}
