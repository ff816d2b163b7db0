//! Statistics tracking for the DNS server.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Atomic statistics for tracking server activity.
pub struct Stats {
    pub received: AtomicU64,
    pub answered: AtomicU64,
    pub nxdomain: AtomicU64,
    pub malformed: AtomicU64,
    pub dropped: AtomicU64,
    pub send_errors: AtomicU64,
    /// Responses sent that exceed the classic 512 byte UDP payload.
    pub oversized: AtomicU64,
    /// Cumulative handling time in microseconds for averaging.
    total_response_time_us: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    started: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            answered: AtomicU64::new(0),
            nxdomain: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
            oversized: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// A response was sent; `answer_count == 0` counts as NXDOMAIN.
    pub fn record_response(&self, answer_count: usize, response_time_ms: f64) {
        if answer_count == 0 {
            self.nxdomain.fetch_add(1, Ordering::Relaxed);
        } else {
            self.answered.fetch_add(1, Ordering::Relaxed);
        }
        self.total_response_time_us
            .fetch_add((response_time_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversized(&self) {
        self.oversized.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark one datagram as being handled until the guard is dropped.
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
        InFlightGuard { stats: self }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Highest number of datagrams handled at once since the last reset.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let received = self.received.swap(0, Ordering::Relaxed);
        let answered = self.answered.swap(0, Ordering::Relaxed);
        let nxdomain = self.nxdomain.swap(0, Ordering::Relaxed);
        let malformed = self.malformed.swap(0, Ordering::Relaxed);
        let dropped = self.dropped.swap(0, Ordering::Relaxed);
        let send_errors = self.send_errors.swap(0, Ordering::Relaxed);
        let oversized = self.oversized.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);
        let in_flight = self.in_flight.load(Ordering::Relaxed);
        let peak_in_flight = self.peak_in_flight.swap(in_flight, Ordering::Relaxed);

        let responses = answered + nxdomain;
        let avg_response_ms = if responses > 0 {
            (total_us as f64 / responses as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            received,
            answered,
            nxdomain,
            malformed,
            dropped,
            send_errors,
            oversized,
            in_flight,
            peak_in_flight,
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge on drop.
pub struct InFlightGuard<'a> {
    stats: &'a Stats,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub received: u64,
    pub answered: u64,
    pub nxdomain: u64,
    pub malformed: u64,
    pub dropped: u64,
    pub send_errors: u64,
    pub oversized: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
    pub avg_response_ms: f64,
}
