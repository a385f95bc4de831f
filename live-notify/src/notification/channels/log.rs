use async_trait::async_trait;
use tracing::info;

use super::{MessageSender, OutgoingMessage};
use crate::Result;

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    fn sender_type(&self) -> &'static str {
        "log"
    }

    async fn send(&self, session_id: &str, message: &OutgoingMessage) -> Result<()> {
        info!(
            session_id,
            image = ?message.image,
            "Message:\n{}",
            message.text
        );
        Ok(())
    }
}
