//! Per-room monitor and its transition table.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::NotificationEvent;
use super::provider::{FetchError, ObservedStatus, Snapshot, StatusProvider};
use super::state::{LiveStatus, RoomId, RoomState};

/// Text format used by the provider for live start times.
pub const LIVE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Result of one `check_once` call.
#[derive(Debug)]
pub enum CheckOutcome {
    /// A genuine edge was detected and applied.
    Transition(NotificationEvent),
    /// The snapshot was applied without producing an edge.
    NoChange,
    /// No information this cycle; the state was not touched.
    FetchFailed(FetchError),
}

impl CheckOutcome {
    pub fn event(&self) -> Option<&NotificationEvent> {
        match self {
            CheckOutcome::Transition(event) => Some(event),
            _ => None,
        }
    }

    pub fn into_event(self) -> Option<NotificationEvent> {
        match self {
            CheckOutcome::Transition(event) => Some(event),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveTimeParseError {
    #[error("live time is missing")]
    Missing,
    #[error("unrecognized live time {0:?}")]
    Invalid(String),
}

/// Parse a provider live-start time.
///
/// Accepts [`LIVE_TIME_FORMAT`] in the provider timezone or positive unix seconds.
pub fn parse_live_time(raw: Option<&str>, provider_tz: Tz) -> Result<DateTime<Utc>, LiveTimeParseError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(LiveTimeParseError::Missing);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, LIVE_TIME_FORMAT) {
        return provider_tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| LiveTimeParseError::Invalid(raw.to_string()));
    }

    match raw.parse::<i64>() {
        Ok(secs) if secs > 0 => DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| LiveTimeParseError::Invalid(raw.to_string())),
        _ => Err(LiveTimeParseError::Invalid(raw.to_string())),
    }
}

/// Owns one [`RoomState`] and applies fetched snapshots to it.
pub struct RoomMonitor {
    state: RoomState,
    provider: Arc<dyn StatusProvider>,
    provider_tz: Tz,
    last_warning: Option<String>,
}

impl fmt::Debug for RoomMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomMonitor")
            .field("state", &self.state)
            .field("provider_tz", &self.provider_tz)
            .field("last_warning", &self.last_warning)
            .finish_non_exhaustive()
    }
}

impl RoomMonitor {
    pub fn new(
        room_id: RoomId,
        anchor_name: impl Into<String>,
        provider: Arc<dyn StatusProvider>,
        provider_tz: Tz,
    ) -> Self {
        Self {
            state: RoomState::new(room_id, anchor_name),
            provider,
            provider_tz,
            last_warning: None,
        }
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn room_id(&self) -> &RoomId {
        &self.state.room_id
    }

    /// Most recent recoverable warning, e.g. an unparseable live time.
    pub fn last_warning(&self) -> Option<&str> {
        self.last_warning.as_deref()
    }

    pub async fn check_once(&mut self) -> CheckOutcome {
        self.check_once_at(Utc::now()).await
    }

    /// Fetch a snapshot and apply it as observed at `now`.
    pub async fn check_once_at(&mut self, now: DateTime<Utc>) -> CheckOutcome {
        match self.provider.fetch_snapshot(&self.state.room_id).await {
            Ok(snapshot) => self.apply_snapshot(snapshot, now),
            Err(e) => {
                warn!("Failed to check room {}: {}", self.state.room_id, e);
                CheckOutcome::FetchFailed(e)
            }
        }
    }

    /// Apply one snapshot to the state machine.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, now: DateTime<Utc>) -> CheckOutcome {
        self.state.last_check_time = Some(now);
        if let Some(title) = snapshot.title.filter(|t| !t.is_empty()) {
            self.state.room_title = title;
        }
        if let Some(cover) = snapshot.cover_url.filter(|c| !c.is_empty()) {
            self.state.cover_url = cover;
        }

        let room_id = self.state.room_id.clone();
        match (self.state.status, snapshot.status) {
            (LiveStatus::Unknown, ObservedStatus::Live) => {
                let start = self.resolve_start_time(snapshot.live_time_raw.as_deref(), now);
                self.state.status = LiveStatus::Live;
                self.state.live_start_time = Some(start);
                self.state.has_fired_live_edge = true;
                debug!("Room {} baseline: live since {}", room_id, start);
                CheckOutcome::NoChange
            }
            (LiveStatus::Unknown, ObservedStatus::Offline) => {
                self.state.status = LiveStatus::Offline;
                debug!("Room {} baseline: offline", room_id);
                CheckOutcome::NoChange
            }
            (LiveStatus::Live, ObservedStatus::Offline) => {
                let ended = self.state.live_duration(now);
                self.state.status = LiveStatus::Offline;
                self.state.live_start_time = None;
                self.state.has_fired_live_edge = false;
                info!("Room {} went offline", room_id);
                CheckOutcome::Transition(NotificationEvent::new_offline(
                    self.state.clone(),
                    ended,
                    now,
                ))
            }
            (LiveStatus::Offline, ObservedStatus::Live) => {
                let start = self.resolve_start_time(snapshot.live_time_raw.as_deref(), now);
                self.state.status = LiveStatus::Live;
                self.state.live_start_time = Some(start);
                if self.state.has_fired_live_edge {
                    return CheckOutcome::NoChange;
                }
                self.state.has_fired_live_edge = true;
                info!("Room {} went live at {}", room_id, start);
                CheckOutcome::Transition(NotificationEvent::new_live(self.state.clone(), now))
            }
            (LiveStatus::Live, ObservedStatus::Live)
            | (LiveStatus::Offline, ObservedStatus::Offline) => CheckOutcome::NoChange,
        }
    }

    fn resolve_start_time(&mut self, raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
        match parse_live_time(raw, self.provider_tz) {
            Ok(start) => start,
            Err(e) => {
                let message = format!(
                    "room {}: {}, using detection time instead",
                    self.state.room_id, e
                );
                warn!("{}", message);
                self.last_warning = Some(message);
                now
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::events::EdgeKind;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use chrono_tz::Asia::Shanghai;
    use parking_lot::Mutex;
    use rstest::rstest;
    use std::collections::VecDeque;

    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<Snapshot, FetchError>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Snapshot, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl StatusProvider for ScriptedProvider {
        async fn fetch_snapshot(&self, _room_id: &RoomId) -> Result<Snapshot, FetchError> {
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".to_string())))
        }
    }

    fn monitor(script: Vec<Result<Snapshot, FetchError>>) -> RoomMonitor {
        RoomMonitor::new(RoomId::from("42"), "anchor", ScriptedProvider::new(script), Shanghai)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn kind(outcome: &CheckOutcome) -> Option<EdgeKind> {
        outcome.event().map(|e| e.kind)
    }

    #[rstest]
    #[case("2024-01-01 20:00:00", Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())]
    #[case(" 2024-01-01 20:00:00 ", Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())]
    #[case("1704110400", Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())]
    fn test_parse_live_time(#[case] raw: &str, #[case] expected: DateTime<Utc>) {
        assert_eq!(parse_live_time(Some(raw), Shanghai).unwrap(), expected);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("0000-00-00 00:00:00"))]
    #[case(Some("yesterday evening"))]
    #[case(Some("0"))]
    #[case(Some("-5"))]
    fn test_parse_live_time_rejects(#[case] raw: Option<&str>) {
        assert!(parse_live_time(raw, Shanghai).is_err());
    }

    #[tokio::test]
    async fn test_scenario_unknown_live_live_offline_live() {
        let mut monitor = monitor(vec![
            Err(FetchError::Transport("timeout".to_string())),
            Ok(Snapshot::live(Some("2024-01-01 19:30:00"))),
            Ok(Snapshot::live(Some("2024-01-01 19:30:00"))),
            Ok(Snapshot::offline()),
            Ok(Snapshot::live(Some("2024-01-01 20:40:00"))),
        ]);

        let first = monitor.check_once_at(at(0)).await;
        assert!(matches!(first, CheckOutcome::FetchFailed(_)));
        assert_eq!(monitor.state().status, LiveStatus::Unknown);
        assert_eq!(monitor.state().last_check_time, None);

        let second = monitor.check_once_at(at(60)).await;
        assert_eq!(kind(&second), None);
        assert!(monitor.state().has_fired_live_edge);
        let start = monitor.state().live_start_time.unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 11, 30, 0).unwrap());

        let third = monitor.check_once_at(at(120)).await;
        assert_eq!(kind(&third), None);
        assert_eq!(monitor.state().live_duration(at(120)), Some(at(120) - start));

        let fourth = monitor.check_once_at(at(180)).await;
        assert_eq!(kind(&fourth), Some(EdgeKind::NewOffline));
        let event = fourth.into_event().unwrap();
        assert_eq!(event.ended_duration, Some(at(180) - start));
        assert_eq!(monitor.state().live_start_time, None);
        assert!(!monitor.state().has_fired_live_edge);

        let fifth = monitor.check_once_at(at(240)).await;
        assert_eq!(kind(&fifth), Some(EdgeKind::NewLive));
        assert!(monitor.state().has_fired_live_edge);
        assert_eq!(
            monitor.state().live_start_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 12, 40, 0).unwrap())
        );
    }

    #[test]
    fn test_first_offline_observation_is_silent() {
        let mut monitor = monitor(vec![]);
        let outcome = monitor.apply_snapshot(Snapshot::offline(), at(0));
        assert_eq!(kind(&outcome), None);
        assert_eq!(monitor.state().status, LiveStatus::Offline);
        assert!(!monitor.state().has_fired_live_edge);
    }

    #[test]
    fn test_one_edge_per_physical_transition() {
        let mut monitor = monitor(vec![]);
        let observed = [false, true, true, true, false, false, true, true, false];

        let mut edges = Vec::new();
        for (i, live) in observed.iter().enumerate() {
            let snapshot = if *live {
                Snapshot::live(Some("2024-01-01 20:00:00"))
            } else {
                Snapshot::offline()
            };
            if let Some(kind) = kind(&monitor.apply_snapshot(snapshot, at(i as i64 * 60))) {
                edges.push(kind);
            }
            assert_eq!(monitor.state().has_fired_live_edge, *live);
            assert_eq!(monitor.state().live_start_time.is_some(), *live);
        }

        assert_eq!(
            edges,
            vec![
                EdgeKind::NewLive,
                EdgeKind::NewOffline,
                EdgeKind::NewLive,
                EdgeKind::NewOffline
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state_unchanged() {
        let mut monitor = monitor(vec![
            Ok(Snapshot::live(Some("2024-01-01 20:00:00")).with_title("stream")),
            Err(FetchError::Provider {
                code: -400,
                message: "bad request".to_string(),
            }),
        ]);

        monitor.check_once_at(at(0)).await;
        let before = monitor.state().clone();

        let outcome = monitor.check_once_at(at(60)).await;
        assert!(matches!(outcome, CheckOutcome::FetchFailed(FetchError::Provider { .. })));
        assert_eq!(monitor.state(), &before);
    }

    #[test]
    fn test_unparseable_live_time_falls_back_to_now() {
        let mut monitor = monitor(vec![]);
        monitor.apply_snapshot(Snapshot::offline(), at(0));
        assert!(monitor.last_warning().is_none());

        let outcome = monitor.apply_snapshot(Snapshot::live(Some("garbage")), at(60));
        assert_eq!(kind(&outcome), Some(EdgeKind::NewLive));
        assert_eq!(monitor.state().live_start_time, Some(at(60)));
        assert!(monitor.last_warning().unwrap().contains("garbage"));

        let mut monitor = self::monitor(vec![]);
        monitor.apply_snapshot(Snapshot::live(Some("")), at(0));
        assert_eq!(monitor.state().live_start_time, Some(at(0)));
        assert!(monitor.last_warning().is_some());
    }

    #[test]
    fn test_title_and_cover_are_kept_when_missing() {
        let mut monitor = monitor(vec![]);
        monitor.apply_snapshot(
            Snapshot::offline()
                .with_title("Evening stream")
                .with_cover("https://example.com/c.jpg"),
            at(0),
        );
        monitor.apply_snapshot(Snapshot::offline(), at(60));

        assert_eq!(monitor.state().room_title, "Evening stream");
        assert_eq!(monitor.state().cover_url, "https://example.com/c.jpg");
        assert_eq!(monitor.state().last_check_time, Some(at(60)));
    }

    #[test]
    fn test_live_edge_carries_state_snapshot() {
        let mut monitor = monitor(vec![]);
        monitor.apply_snapshot(Snapshot::offline(), at(0));
        let event = monitor
            .apply_snapshot(Snapshot::live(None).with_title("Late show"), at(30))
            .into_event()
            .unwrap();

        assert_eq!(event.room_id.as_str(), "42");
        assert_eq!(event.snapshot.room_title, "Late show");
        assert_eq!(event.snapshot.status, LiveStatus::Live);
        assert_eq!(event.ended_duration, None);
        assert_eq!(event.timestamp, at(30));
    }
}
