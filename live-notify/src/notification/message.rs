//! Template arguments built from room state.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;

use super::template::TemplateArgs;
use crate::monitor::{NotificationEvent, RoomState, format_duration};

/// Time format used in every rendered message.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rendered in place of values that are not known.
pub const UNKNOWN: &str = "unknown";

pub fn format_time(time: Option<DateTime<Utc>>, tz: Tz) -> String {
    time.map(|t| t.with_timezone(&tz).format(DISPLAY_TIME_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn format_optional_duration(duration: Option<TimeDelta>) -> String {
    duration
        .map(format_duration)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Arguments every room template can use.
pub fn room_args(state: &RoomState, tz: Tz) -> TemplateArgs {
    let mut args = TemplateArgs::new();
    args.insert("anchor_name", state.anchor_name.clone());
    args.insert("room_id", state.room_id.to_string());
    args.insert("room_title", state.room_title.clone());
    args.insert("room_url", state.room_url());
    args.insert("last_check_time", format_time(state.last_check_time, tz));
    args
}

/// Arguments for a status query, including the running duration at `now`.
pub fn status_args(state: &RoomState, now: DateTime<Utc>, tz: Tz) -> TemplateArgs {
    let mut args = room_args(state, tz);
    args.insert("start_time", format_time(state.live_start_time, tz));
    args.insert("duration", format_optional_duration(state.live_duration(now)));
    args
}

/// Arguments for an edge notification.
pub fn event_args(event: &NotificationEvent, tz: Tz) -> TemplateArgs {
    let mut args = room_args(&event.snapshot, tz);
    args.insert("start_time", format_time(event.snapshot.live_start_time, tz));
    args.insert("duration", format_optional_duration(event.ended_duration));
    args
}
