//! Notification dispatcher.
//!
//! Fans an edge out to every current subscriber of its room. Each delivery is
//! attempted independently; a failing subscriber is logged and skipped.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{debug, info, warn};

use super::channels::{MessageSender, OutgoingMessage};
use super::cover::CoverFetcher;
use super::message::event_args;
use super::template::{TemplateName, TemplateRenderer};
use crate::monitor::{EdgeKind, NotificationEvent, SessionId};
use crate::subscription::SubscriptionRegistry;

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Sessions whose delivery failed, with the error text.
    pub failed: Vec<(SessionId, String)>,
}

pub struct NotificationDispatcher {
    registry: Arc<SubscriptionRegistry>,
    sender: Arc<dyn MessageSender>,
    renderer: Arc<TemplateRenderer>,
    covers: Arc<dyn CoverFetcher>,
    display_tz: Tz,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        sender: Arc<dyn MessageSender>,
        renderer: Arc<TemplateRenderer>,
        covers: Arc<dyn CoverFetcher>,
        display_tz: Tz,
    ) -> Self {
        Self {
            registry,
            sender,
            renderer,
            covers,
            display_tz,
        }
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Render the message for an event. The cover is fetched at most once.
    pub async fn build_message(&self, event: &NotificationEvent) -> OutgoingMessage {
        let args = event_args(event, self.display_tz);
        match event.kind {
            EdgeKind::NewLive => {
                let text = self.renderer.render(TemplateName::LiveStart, &args);
                match self
                    .covers
                    .fetch(&event.snapshot.cover_url, &event.room_id)
                    .await
                {
                    Some(path) => OutgoingMessage::text(text).with_image(path),
                    None => {
                        let fallback = self.renderer.render(TemplateName::CoverUnavailable, &args);
                        OutgoingMessage::text(format!("{text}\n{fallback}"))
                    }
                }
            }
            EdgeKind::NewOffline => {
                OutgoingMessage::text(self.renderer.render(TemplateName::LiveEnd, &args))
            }
        }
    }

    pub async fn dispatch(&self, event: &NotificationEvent) -> DispatchReport {
        let sids = self.registry.list_subscribers(&event.room_id).await;
        if sids.is_empty() {
            debug!("Room {} has no subscribers, dropping {}", event.room_id, event.kind.as_str());
            return DispatchReport::default();
        }

        let message = self.build_message(event).await;

        let mut report = DispatchReport {
            attempted: sids.len(),
            ..Default::default()
        };
        for sid in sids {
            match self.sender.send(&sid, &message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        "Failed to deliver {} for room {} to {}: {}",
                        event.kind.as_str(),
                        event.room_id,
                        sid,
                        e
                    );
                    report.failed.push((sid, e.to_string()));
                }
            }
        }

        info!(
            "Dispatched {} for room {} via {}: {}/{} delivered",
            event.kind.as_str(),
            event.room_id,
            self.sender.sender_type(),
            report.delivered,
            report.attempted
        );
        report
    }
}
