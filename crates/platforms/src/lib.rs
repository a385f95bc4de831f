//! Live-room status clients.
//!
//! This crate talks to the streaming platforms' public room APIs and turns
//! their responses into plain snapshots. It owns the shared HTTP session so
//! every request made by the application reuses a single connection pool.

pub mod bilibili;
pub mod default;
pub mod error;
pub mod session;

pub use bilibili::{BilibiliLive, RoomSnapshot, room_url};
pub use error::ExtractorError;
pub use session::{HttpSession, SessionOptions, SessionScope};
