//! Per-endpoint statistics and the global request log.
//!
//! # Responsibilities
//! - Hold the mutable stats record of one upstream endpoint
//! - Keep a time-ordered request log per endpoint
//! - Derive success rate, latency and status from that log
//!
//! All timestamps are tokio instants so the paused test clock drives them.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::blockchain::client::RpcConnection;
use crate::health::status::EndpointStatus;

/// Instant `window` before `now`, or `None` if the clock has not run that long.
pub(crate) fn cutoff(now: Instant, window: Duration) -> Option<Instant> {
    now.checked_sub(window)
}

/// A single dispatched attempt or probe.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLogEntry {
    /// Sequence number, unique per endpoint.
    pub seq: u64,
    /// When the attempt was dispatched.
    pub timestamp: Instant,
    /// `None` while the attempt is still in flight.
    pub success: Option<bool>,
    /// Elapsed time, recorded on completion.
    pub response_time: Option<Duration>,
}

/// Mutable stats for one endpoint.
#[derive(Debug)]
pub struct EndpointState {
    /// Normalized endpoint URL; unique key.
    pub url: String,
    /// Connection handed to operations.
    pub connection: RpcConnection,
    /// Dispatched attempts, monotonic.
    pub request_count: u64,
    pub last_request_time: Option<Instant>,
    pub last_error_time: Option<Instant>,
    /// Fractional error score used only for ranking.
    pub error_count: f64,
    /// Drives cooldown and backoff length.
    pub consecutive_errors: u32,
    pub cooldown_until: Option<Instant>,
    /// Mean response time in milliseconds over the stats window.
    pub avg_response_time: f64,
    /// Share of successful attempts over the stats window.
    pub success_rate: f64,
    pub request_log: VecDeque<RequestLogEntry>,
    next_seq: u64,
}

impl EndpointState {
    /// Create stats with optimistic defaults.
    pub fn new(connection: RpcConnection) -> Self {
        Self {
            url: connection.url().to_string(),
            connection,
            request_count: 0,
            last_request_time: None,
            last_error_time: None,
            error_count: 0.0,
            consecutive_errors: 0,
            cooldown_until: None,
            avg_response_time: 0.0,
            success_rate: 1.0,
            request_log: VecDeque::new(),
            next_seq: 0,
        }
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// Remaining cooldown, if any.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Record a dispatched attempt. Returns the log sequence number.
    pub fn begin_request(&mut self, now: Instant) -> u64 {
        let seq = self.push_entry(now, None, None);
        self.request_count += 1;
        self.last_request_time = Some(now);
        seq
    }

    /// Mark an in-flight attempt as finished.
    pub fn complete_request(&mut self, seq: u64, success: bool, elapsed: Duration) {
        // In-flight entries sit near the back.
        if let Some(entry) = self.request_log.iter_mut().rev().find(|e| e.seq == seq) {
            entry.success = Some(success);
            entry.response_time = Some(elapsed);
        }
    }

    /// Record a finished probe, stamped when it completed so the log stays ordered.
    pub fn record_probe(&mut self, finished: Instant, success: bool, elapsed: Duration) {
        self.push_entry(finished, Some(success), Some(elapsed));
    }

    fn push_entry(&mut self, timestamp: Instant, success: Option<bool>, response_time: Option<Duration>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.request_log.push_back(RequestLogEntry {
            seq,
            timestamp,
            success,
            response_time,
        });
        seq
    }

    /// Log entries dispatched within `window` of `now`.
    pub fn requests_within(&self, now: Instant, window: Duration) -> usize {
        match cutoff(now, window) {
            Some(since) => self
                .request_log
                .iter()
                .rev()
                .take_while(|e| e.timestamp >= since)
                .count(),
            None => self.request_log.len(),
        }
    }

    /// Recompute `success_rate` and `avg_response_time` from the trailing window.
    ///
    /// Endpoints with no completed entries in the window keep their values.
    pub fn recompute_stats(&mut self, now: Instant, window: Duration) {
        let since = cutoff(now, window);
        let mut completed = 0usize;
        let mut successes = 0usize;
        let mut total_ms = 0.0;
        let mut timed = 0usize;

        for entry in self
            .request_log
            .iter()
            .rev()
            .take_while(|e| since.map_or(true, |s| e.timestamp >= s))
        {
            let Some(success) = entry.success else {
                continue;
            };
            completed += 1;
            if success {
                successes += 1;
            }
            if let Some(rt) = entry.response_time {
                total_ms += rt.as_secs_f64() * 1000.0;
                timed += 1;
            }
        }

        if completed == 0 {
            return;
        }
        self.success_rate = successes as f64 / completed as f64;
        if timed > 0 {
            self.avg_response_time = total_ms / timed as f64;
        }
    }

    /// Drop log entries older than `retention`.
    pub fn prune_log(&mut self, now: Instant, retention: Duration) {
        let Some(since) = cutoff(now, retention) else {
            return;
        };
        while self.request_log.front().is_some_and(|e| e.timestamp < since) {
            self.request_log.pop_front();
        }
    }

    /// Status derived on demand.
    pub fn status(&self, now: Instant) -> EndpointStatus {
        if self.in_cooldown(now) {
            EndpointStatus::Cooldown
        } else if self.success_rate > 0.9 && self.consecutive_errors == 0 {
            EndpointStatus::Healthy
        } else if self.success_rate > 0.5 {
            EndpointStatus::Degraded
        } else {
            EndpointStatus::Unhealthy
        }
    }
}

/// Timestamps of dispatched attempts across all endpoints.
#[derive(Debug, Default)]
pub struct GlobalRequestLog {
    entries: VecDeque<Instant>,
}

impl GlobalRequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt, pruning entries that fell out of the window.
    pub fn record(&mut self, now: Instant, window: Duration) {
        self.prune(now, window);
        self.entries.push_back(now);
    }

    /// Attempts dispatched within `window` of `now`.
    pub fn count_within(&self, now: Instant, window: Duration) -> usize {
        match cutoff(now, window) {
            Some(since) => self.entries.iter().rev().take_while(|t| **t >= since).count(),
            None => self.entries.len(),
        }
    }

    pub fn prune(&mut self, now: Instant, window: Duration) {
        let Some(since) = cutoff(now, window) else {
            return;
        };
        while self.entries.front().is_some_and(|t| *t < since) {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
