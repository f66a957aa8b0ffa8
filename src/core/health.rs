use hdrhistogram::Histogram;
use std::time::{Duration, Instant};

use super::circular_buffer::CircularBuffer;
use super::types::SessionStats;

const MAX_RECENT_ERRORS: usize = 100;
const MAX_ERROR_TEXT_BYTES: usize = 1024;

#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub at: chrono::DateTime<chrono::Utc>,
    pub context: &'static str,
    pub error: String,
}

fn truncate_string(s: &str) -> String {
    if s.len() <= MAX_ERROR_TEXT_BYTES {
        return s.to_string();
    }

    let mut end = MAX_ERROR_TEXT_BYTES;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Session counters, owned by the session actor (no interior mutability).
#[derive(Debug)]
pub struct SessionHealth {
    /// Set while a connection is open.
    connection_started: Option<Instant>,
    inbound: u64,
    outbound: u64,
    decode_failures: u64,
    route_misses: u64,
    handler_failures: u64,
    observer_failures: u64,
    reconnects: u64,
    errors: CircularBuffer<ErrorRecord>,
    // `None` only if the histogram could not be allocated; samples are then dropped.
    keepalive_rtt: Option<Histogram<u64>>,
}

impl Default for SessionHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHealth {
    pub fn new() -> Self {
        Self {
            connection_started: None,
            inbound: 0,
            outbound: 0,
            decode_failures: 0,
            route_misses: 0,
            handler_failures: 0,
            observer_failures: 0,
            reconnects: 0,
            errors: CircularBuffer::new(MAX_RECENT_ERRORS),
            keepalive_rtt: Histogram::new_with_bounds(1, 60_000_000, 3).ok(),
        }
    }

    /// Restart the uptime clock for a freshly opened connection.
    pub fn connection_opened(&mut self) {
        self.connection_started = Some(Instant::now());
    }

    pub fn connection_closed(&mut self) {
        self.connection_started = None;
    }

    pub fn record_inbound(&mut self) {
        self.inbound = self.inbound.saturating_add(1);
    }

    pub fn record_outbound(&mut self) {
        self.outbound = self.outbound.saturating_add(1);
    }

    pub fn record_decode_failure(&mut self, error: &str) {
        self.decode_failures = self.decode_failures.saturating_add(1);
        self.record_error("decode", error);
    }

    pub fn record_route_miss(&mut self) {
        self.route_misses = self.route_misses.saturating_add(1);
    }

    pub fn record_handler_failure(&mut self, kind: &str) {
        self.handler_failures = self.handler_failures.saturating_add(1);
        self.record_error("handler", kind);
    }

    /// `count` observers panicked during one connection-change notification.
    pub fn record_observer_failures(&mut self, count: usize, connected: bool) {
        if count == 0 {
            return;
        }
        self.observer_failures = self.observer_failures.saturating_add(count as u64);
        let change = if connected { "connected" } else { "disconnected" };
        self.record_error("observer", change);
    }

    pub fn record_reconnect(&mut self) {
        self.reconnects = self.reconnects.saturating_add(1);
    }

    pub fn record_error(&mut self, context: &'static str, error: &str) {
        self.errors.push(ErrorRecord {
            at: chrono::Utc::now(),
            context,
            error: truncate_string(error),
        });
    }

    pub fn record_rtt(&mut self, rtt: Duration) {
        let micros = rtt.as_micros().min(u64::MAX as u128) as u64;
        if let Some(histogram) = self.keepalive_rtt.as_mut() {
            histogram.saturating_record(micros.max(1));
        }
    }

    pub fn recent_errors(&self) -> impl DoubleEndedIterator<Item = &ErrorRecord> {
        self.errors.iter()
    }

    pub fn get_stats(&self) -> SessionStats {
        let (p50, p99, samples) = match self.keepalive_rtt.as_ref() {
            Some(h) if !h.is_empty() => (
                h.value_at_percentile(50.0),
                h.value_at_percentile(99.0),
                h.len(),
            ),
            _ => (0, 0, 0),
        };

        SessionStats {
            uptime: self
                .connection_started
                .map(|started| started.elapsed())
                .unwrap_or_default(),
            inbound: self.inbound,
            outbound: self.outbound,
            decode_failures: self.decode_failures,
            route_misses: self.route_misses,
            handler_failures: self.handler_failures,
            observer_failures: self.observer_failures,
            reconnects: self.reconnects,
            recent_errors: self.errors.len(),
            last_error: self
                .errors
                .back()
                .map(|rec| format!("{}: {}", rec.context, rec.error)),
            keepalive_p50_us: p50,
            keepalive_p99_us: p99,
            keepalive_samples: samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keepalive_rtt_percentiles() {
        let mut health = SessionHealth::new();
        health.record_rtt(Duration::from_micros(100));
        health.record_rtt(Duration::from_micros(200));
        health.record_rtt(Duration::from_micros(300));

        let stats = health.get_stats();
        assert_eq!(stats.keepalive_samples, 3);
        assert_eq!(stats.keepalive_p50_us, 200);
        assert_eq!(stats.keepalive_p99_us, 300);
    }

    #[test]
    fn counters_and_bounded_error_log() {
        let mut health = SessionHealth::new();
        for i in 0..105 {
            health.record_decode_failure(&format!("bad frame {i}"));
        }
        health.record_route_miss();
        health.record_handler_failure("chat_chunk");
        health.record_inbound();
        health.record_outbound();
        health.record_reconnect();

        let stats = health.get_stats();
        assert_eq!(stats.decode_failures, 105);
        assert_eq!(stats.route_misses, 1);
        assert_eq!(stats.handler_failures, 1);
        assert_eq!(stats.inbound, 1);
        assert_eq!(stats.outbound, 1);
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.recent_errors, MAX_RECENT_ERRORS);
        assert_eq!(stats.last_error.as_deref(), Some("handler: chat_chunk"));
        assert_eq!(
            health.recent_errors().next().map(|r| r.error.as_str()),
            Some("bad frame 6")
        );
    }

    #[test]
    fn observer_failures_are_counted_and_logged() {
        let mut health = SessionHealth::new();
        health.record_observer_failures(0, true);
        assert_eq!(health.get_stats().observer_failures, 0);
        assert_eq!(health.get_stats().recent_errors, 0);

        health.record_observer_failures(2, true);
        let stats = health.get_stats();
        assert_eq!(stats.observer_failures, 2);
        assert_eq!(stats.handler_failures, 0);
        assert_eq!(stats.last_error.as_deref(), Some("observer: connected"));
    }

    #[test]
    fn uptime_is_zero_without_an_open_connection() {
        let mut health = SessionHealth::new();
        assert_eq!(health.get_stats().uptime, Duration::ZERO);

        health.connection_opened();
        std::thread::sleep(Duration::from_millis(2));
        assert!(health.get_stats().uptime > Duration::ZERO);

        health.connection_closed();
        assert_eq!(health.get_stats().uptime, Duration::ZERO);
    }

    #[test]
    fn error_text_is_capped() {
        let mut health = SessionHealth::new();
        health.record_error("transport", &"x".repeat(MAX_ERROR_TEXT_BYTES + 10));
        let rec = health.recent_errors().next().expect("record");
        assert_eq!(rec.error.len(), MAX_ERROR_TEXT_BYTES);
    }
}
