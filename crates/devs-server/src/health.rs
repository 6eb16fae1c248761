//! `/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use devs_core::protocol::BuildStatus;

use crate::build::WatchSessionInfo;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// When the server started.
    pub started_at: DateTime<Utc>,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
    /// Number of live watch sessions.
    pub active_watches: usize,
    /// Live watch sessions, oldest first.
    pub watches: Vec<WatchSessionInfo>,
    /// Most recent successful build from any client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ok_build: Option<BuildStatus>,
}

/// Build a health response from live counters.
pub fn health_check(
    started_at: DateTime<Utc>,
    start_time: Instant,
    connections: usize,
    watches: Vec<WatchSessionInfo>,
    last_ok_build: Option<BuildStatus>,
) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        started_at,
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_watches: watches.len(),
        watches,
        last_ok_build,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::WatchState;
    use devs_core::protocol::BuildReqArgs;

    fn session(id: u64) -> WatchSessionInfo {
        WatchSessionInfo {
            id,
            client: "client_1".into(),
            args: BuildReqArgs {
                filename: "main.ts".into(),
                ..BuildReqArgs::default()
            },
            state: WatchState::Streaming,
            updates: 3,
        }
    }

    #[test]
    fn status_is_ok() {
        let resp = health_check(Utc::now(), Instant::now(), 0, Vec::new(), None);
        assert_eq!(resp.status, "ok");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        let resp = health_check(Utc::now(), start, 0, Vec::new(), None);
        assert!(resp.uptime_secs >= 59);
    }

    #[test]
    fn counters_tracked() {
        let resp = health_check(Utc::now(), Instant::now(), 5, vec![session(1), session(2)], None);
        assert_eq!(resp.connections, 5);
        assert_eq!(resp.active_watches, 2);
    }

    #[test]
    fn serializes_all_fields() {
        let resp = health_check(Utc::now(), Instant::now(), 1, Vec::new(), None);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["started_at"].is_string());
        assert!(json["uptime_secs"].is_u64());
        assert_eq!(json["connections"], 1);
        assert_eq!(json["active_watches"], 0);
        assert_eq!(json["watches"], serde_json::json!([]));
        assert!(json.get("last_ok_build").is_none());
    }

    #[test]
    fn serializes_sessions_and_last_build() {
        let resp = health_check(
            Utc::now(),
            Instant::now(),
            1,
            vec![session(7)],
            Some(BuildStatus {
                success: true,
                ..BuildStatus::default()
            }),
        );
        let json = serde_json::to_value(&resp).unwrap();
        let watch = &json["watches"][0];
        assert_eq!(watch["id"], 7);
        assert_eq!(watch["client"], "client_1");
        assert_eq!(watch["args"]["filename"], "main.ts");
        assert_eq!(watch["state"], "streaming");
        assert_eq!(watch["updates"], 3);
        assert_eq!(json["last_ok_build"]["success"], true);
    }
}
