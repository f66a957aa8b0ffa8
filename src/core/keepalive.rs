use std::time::Duration;

use tokio::time::Instant;

/// Default interval between keepalive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Application-level keepalive state.
///
/// The monitor only decides *whether* a ping is due and measures the pong that answers it. The
/// ticker that drives it is owned by the session actor and lives exactly as long as one
/// `Connected` period, so a closed session never produces pings.
#[derive(Debug, Default)]
pub struct KeepaliveMonitor {
    interval: Option<Duration>,
    last_ping: Option<Instant>,
    last_pong: Option<Instant>,
    pings_sent: u64,
}

impl KeepaliveMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable keepalive; a zero interval is rejected.
    pub fn enable(&mut self, interval: Duration) -> bool {
        if interval.is_zero() {
            return false;
        }
        self.interval = Some(interval);
        true
    }

    pub fn disable(&mut self) {
        self.interval = None;
        self.reset();
    }

    #[inline]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    pub fn pings_sent(&self) -> u64 {
        self.pings_sent
    }

    pub fn record_ping(&mut self) {
        self.last_ping = Some(Instant::now());
        self.pings_sent = self.pings_sent.saturating_add(1);
    }

    /// Match a `pong` against the outstanding ping. Returns the round trip, if one was pending.
    pub fn record_pong(&mut self) -> Option<Duration> {
        let now = Instant::now();
        self.last_pong = Some(now);
        self.last_ping
            .take()
            .map(|sent| now.saturating_duration_since(sent))
    }

    /// Forget in-flight pings; called whenever a connection ends.
    pub fn reset(&mut self) {
        self.last_ping = None;
        self.last_pong = None;
    }

    pub fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        let mut monitor = KeepaliveMonitor::new();
        assert!(!monitor.enable(Duration::ZERO));
        assert!(!monitor.is_enabled());
        assert!(monitor.enable(DEFAULT_KEEPALIVE_INTERVAL));
        assert_eq!(monitor.interval(), Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn pong_yields_round_trip_of_outstanding_ping() {
        let mut monitor = KeepaliveMonitor::new();
        monitor.enable(Duration::from_secs(1));

        assert_eq!(monitor.record_pong(), None);

        monitor.record_ping();
        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(monitor.record_pong(), Some(Duration::from_millis(40)));
        assert_eq!(monitor.record_pong(), None, "a pong answers one ping");
        assert_eq!(monitor.pings_sent(), 1);
    }

    #[test]
    fn reset_drops_pending_ping() {
        let mut monitor = KeepaliveMonitor::new();
        monitor.record_ping();
        monitor.reset();
        assert_eq!(monitor.record_pong(), None);

        monitor.disable();
        assert!(monitor.interval().is_none());
    }
}
