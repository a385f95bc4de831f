//! live-notify library crate.
//!
//! Watches live-broadcast rooms and notifies every subscribed session exactly
//! once per offline/live transition.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod scheduler;
pub mod services;
pub mod subscription;

pub use error::{Error, Result};
