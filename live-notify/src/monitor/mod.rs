//! Room monitoring.
//!
//! A [`RoomMonitor`] owns the [`RoomState`] of one room and turns provider
//! snapshots into [`NotificationEvent`]s. The first observation of a room only
//! records a baseline; edges are reported for later offline/live changes.

pub mod events;
pub mod provider;
pub mod room;
pub mod state;

pub use events::{EdgeKind, NotificationEvent};
pub use provider::{BilibiliStatusProvider, FetchError, ObservedStatus, Snapshot, StatusProvider};
pub use room::{CheckOutcome, LIVE_TIME_FORMAT, LiveTimeParseError, RoomMonitor, parse_live_time};
pub use state::{DEFAULT_ROOM_TITLE, LiveStatus, RoomId, RoomState, SessionId, format_duration};
