//! Notification system.
//!
//! Edges detected by the monitors are rendered from templates and delivered
//! to every subscriber through a [`MessageSender`].

pub mod channels;
pub mod cover;
pub mod message;
pub mod service;
pub mod template;

pub use channels::{ChannelConfig, MessageSender, OutgoingMessage};
pub use cover::{CoverFetcher, HttpCoverFetcher, NoCover};
pub use service::{DispatchReport, NotificationDispatcher};
pub use template::{TemplateConfig, TemplateName, TemplateRenderer, TemplateSet};
