use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::time::Duration;

/// A watched map is running on the busiest server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MapAlert {
    pub map: String,
    pub server_url: String,
    pub players: String,
    pub map_image_url: Option<String>,
    pub at: DateTime<Utc>,
}

/// Receives alerts; implementations must not block for long.
pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &MapAlert);
}

/// Emits alerts as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, alert: &MapAlert) {
        tracing::info!(
            target: "mapwatch.alert",
            map = %alert.map,
            server = %alert.server_url,
            players = %alert.players,
            "favourite map is running"
        );
    }
}

/// Suppresses repeat alerts.
///
/// An alert is held back while the previous one is younger than the cooldown,
/// and whenever the map is the same one that was last announced.
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown: TimeDelta,
    last: Option<(String, DateTime<Utc>)>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: TimeDelta::from_std(cooldown).unwrap_or(TimeDelta::MAX),
            last: None,
        }
    }

    /// Decide whether `map` may be announced at `now`; records it when allowed.
    pub fn admit(&mut self, map: &str, now: DateTime<Utc>) -> bool {
        if let Some((last_map, at)) = &self.last {
            if now.signed_duration_since(*at) < self.cooldown || last_map == map {
                return false;
            }
        }
        self.last = Some((map.to_string(), now));
        true
    }

    pub fn last(&self) -> Option<(&str, DateTime<Utc>)> {
        self.last.as_ref().map(|(m, at)| (m.as_str(), *at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn first_alert_passes() {
        let mut gate = AlertGate::new(Duration::from_secs(900));
        assert!(gate.admit("pl_upward", t(0)));
        assert_eq!(gate.last(), Some(("pl_upward", t(0))));
    }

    #[test]
    fn other_map_within_cooldown_is_held() {
        let mut gate = AlertGate::new(Duration::from_secs(900));
        assert!(gate.admit("pl_upward", t(0)));
        assert!(!gate.admit("cp_granary", t(899)));
        assert!(gate.admit("cp_granary", t(900)));
    }

    #[test]
    fn same_map_is_never_repeated() {
        let mut gate = AlertGate::new(Duration::from_secs(900));
        assert!(gate.admit("pl_upward", t(0)));
        assert!(!gate.admit("pl_upward", t(10_000)));
        assert!(gate.admit("cp_granary", t(10_001)));
        assert!(gate.admit("pl_upward", t(20_000)));
    }

    #[test]
    fn held_alert_does_not_reset_the_clock() {
        let mut gate = AlertGate::new(Duration::from_secs(900));
        assert!(gate.admit("a", t(0)));
        assert!(!gate.admit("b", t(500)));
        assert!(gate.admit("b", t(901)));
    }
}
