// watchdog.rs — restarts the location feed when it goes silent.
//
// Timestamps are passed in rather than read from Instant::now() so
// the backoff schedule is deterministic under test.

use chrono::{DateTime, Duration, Utc};
use log::warn;

use crate::config::TrackerConfig;

pub struct LocationWatchdog {
    stale_after: Duration,
    max_attempts: u32,
    base_cooldown: Duration,
    current_cooldown: Duration,
    attempts: u32,
    last_update: Option<DateTime<Utc>>,
    next_retry: Option<DateTime<Utc>>,
}

impl LocationWatchdog {
    pub fn new(config: &TrackerConfig) -> Self {
        let base_cooldown = Duration::seconds(config.watchdog_base_cooldown_secs as i64);
        LocationWatchdog {
            stale_after: Duration::seconds(config.location_stale_secs as i64),
            max_attempts: config.watchdog_max_attempts,
            base_cooldown,
            current_cooldown: base_cooldown,
            attempts: 0,
            last_update: None,
            next_retry: None,
        }
    }

    /// Record a live location update.
    pub fn feed_alive(&mut self, now: DateTime<Utc>) {
        self.last_update = Some(now);
        self.attempts = 0;
        self.current_cooldown = self.base_cooldown;
        self.next_retry = None;
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.last_update
            .map_or(false, |t| now - t > self.stale_after)
    }

    /// True when the feed is silent, a restart is allowed and the
    /// backoff window has passed. Recording the attempt advances the
    /// schedule: cooldown grows 1.5x per attempt, capped at 30s.
    pub fn restart_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_stale(now) || self.attempts >= self.max_attempts {
            return false;
        }
        if let Some(next) = self.next_retry {
            if now < next {
                return false;
            }
        }
        self.attempts += 1;
        let secs = (self.current_cooldown.num_milliseconds() as f64 / 1000.0 * 1.5).min(30.0);
        self.current_cooldown = Duration::milliseconds((secs * 1000.0) as i64);
        self.next_retry = Some(now + self.current_cooldown);
        warn!(
            "location feed silent, restart attempt {}/{} (next retry in {:.1}s)",
            self.attempts,
            self.max_attempts,
            secs
        );
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn watchdog() -> LocationWatchdog {
        LocationWatchdog::new(&TrackerConfig::default())
    }

    #[test]
    fn silent_feed_detected_after_threshold() {
        let mut w = watchdog();
        assert!(!w.is_stale(at(100)), "never-fed watchdog is not stale");
        w.feed_alive(at(0));
        assert!(!w.is_stale(at(29)));
        assert!(w.is_stale(at(31)));
    }

    #[test]
    fn restart_backs_off() {
        let mut w = watchdog();
        w.feed_alive(at(0));
        assert!(w.restart_due(at(31)));
        // Inside the 3s cooldown window.
        assert!(!w.restart_due(at(32)));
        assert!(w.restart_due(at(35)));
        assert_eq!(w.attempts(), 2);
    }

    #[test]
    fn live_update_resets_backoff() {
        let mut w = watchdog();
        w.feed_alive(at(0));
        assert!(w.restart_due(at(31)));
        w.feed_alive(at(40));
        assert_eq!(w.attempts(), 0);
        assert!(!w.is_stale(at(50)));
    }

    #[test]
    fn respects_max_attempts() {
        let mut cfg = TrackerConfig::default();
        cfg.watchdog_max_attempts = 1;
        let mut w = LocationWatchdog::new(&cfg);
        w.feed_alive(at(0));
        assert!(w.restart_due(at(31)));
        assert!(!w.restart_due(at(1000)));
    }
}
