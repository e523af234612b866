//! Retry orchestration around caller-supplied operations.
//!
//! # Responsibilities
//! - Select an endpoint per attempt and enforce throttling
//! - Run the operation under a deadline
//! - Feed outcomes into the circuit breaker
//! - Back off between attempts and give up after the retry budget
//!
//! # Design Decisions
//! - Throttled spins sleep and re-select but never consume an attempt
//! - The in-flight counter is released by an RAII guard, so success, failure,
//!   timeout and caller cancellation all release it exactly once
//! - The last observed error is what the caller sees

use std::future::Future;
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::blockchain::client::RpcConnection;
use crate::blockchain::types::{RpcError, RpcResult};
use crate::manager::{RpcManager, Shared};
use crate::observability::metrics;
use crate::resilience::backoff::backoff_for;
use crate::resilience::circuit_breaker::{classify, record_failure, record_success};
use crate::resilience::throttle::{ThrottleGuard, ThrottleReason};

enum Step {
    Throttled {
        url: String,
        reason: ThrottleReason,
        delay: Duration,
    },
    Dispatch(InFlight, RpcConnection),
}

/// One dispatched attempt. Dropping it unsettled records a cancelled failure.
struct InFlight {
    shared: Arc<Shared>,
    url: String,
    seq: u64,
    started: Instant,
    settled: bool,
}

impl InFlight {
    /// Release the pending slot and apply the outcome to the endpoint.
    ///
    /// Returns the endpoint's consecutive error count afterwards, or `None`
    /// if the endpoint was removed while the attempt was in flight.
    fn settle(&mut self, outcome: Result<(), &RpcError>) -> Option<u32> {
        self.settled = true;
        let elapsed = self.started.elapsed();
        let config = self.shared.config.load();
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        state.pending_requests = state.pending_requests.saturating_sub(1);
        metrics::set_pending(state.pending_requests);
        metrics::record_attempt(&self.url, outcome.is_ok(), elapsed);

        let ep = state.registry.find_mut(&self.url)?;
        match outcome {
            Ok(()) => {
                ep.complete_request(self.seq, true, elapsed);
                record_success(ep);
            }
            Err(err) => {
                ep.complete_request(self.seq, false, elapsed);
                let class = classify(err);
                if record_failure(ep, class, &config.cooldown, Instant::now()).is_some() {
                    metrics::record_cooldown(&self.url, class.as_str());
                }
            }
        }
        Some(ep.consecutive_errors)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(url = %self.url, "RPC attempt abandoned by caller");
            self.settle(Err(&RpcError::Cancelled));
        }
    }
}

impl RpcManager {
    /// Run `operation` against the healthiest endpoint, retrying across
    /// endpoints up to the configured `max_retries`.
    pub async fn execute_with_fallback<T, F, Fut>(&self, operation: F) -> RpcResult<T>
    where
        F: FnMut(RpcConnection) -> Fut,
        Fut: Future<Output = RpcResult<T>>,
    {
        let max_retries = self.config().retries.max_retries;
        self.execute_with_retries(operation, max_retries).await
    }

    /// Like `execute_with_fallback` with an explicit retry bound.
    ///
    /// At most `max_retries + 1` attempts are dispatched.
    pub async fn execute_with_retries<T, F, Fut>(&self, mut operation: F, max_retries: u32) -> RpcResult<T>
    where
        F: FnMut(RpcConnection) -> Fut,
        Fut: Future<Output = RpcResult<T>>,
    {
        let call_id = Uuid::new_v4();
        let mut attempt: u32 = 0;
        let mut reselect = false;

        loop {
            let config = self.config();
            let step = {
                let mut state = self.lock_state();
                let now = Instant::now();
                if attempt > 0 || reselect {
                    state.registry.select_best(now);
                }
                let Some(idx) = state.registry.current() else {
                    return Err(RpcError::NoEndpoints);
                };

                let guard = ThrottleGuard::new(&config.limits);
                let pending = state.pending_requests;
                let reason = {
                    let Some(ep) = state.registry.get(idx) else {
                        return Err(RpcError::NoEndpoints);
                    };
                    guard.check(ep, &state.global_log, pending, now)
                };

                let window = config.limits.window();
                let state = &mut *state;
                let Some(ep) = state.registry.get_mut(idx) else {
                    return Err(RpcError::NoEndpoints);
                };
                match reason {
                    Some(reason) => Step::Throttled {
                        url: ep.url.clone(),
                        reason,
                        delay: backoff_for(ep.consecutive_errors, &config.retries),
                    },
                    None => {
                        let seq = ep.begin_request(now);
                        let connection = ep.connection.clone();
                        let url = ep.url.clone();
                        state.global_log.record(now, window);
                        state.pending_requests += 1;
                        metrics::set_pending(state.pending_requests);
                        Step::Dispatch(
                            InFlight {
                                shared: self.shared.clone(),
                                url,
                                seq,
                                started: now,
                                settled: false,
                            },
                            connection,
                        )
                    }
                }
            };

            let (mut in_flight, connection) = match step {
                Step::Throttled { url, reason, delay } => {
                    metrics::record_throttle(reason.as_str());
                    tracing::debug!(
                        call_id = %call_id,
                        url = %url,
                        reason = reason.as_str(),
                        delay = ?delay,
                        "Attempt throttled"
                    );
                    tokio::time::sleep(delay).await;
                    reselect = true;
                    continue;
                }
                Step::Dispatch(in_flight, connection) => (in_flight, connection),
            };
            reselect = false;

            let timeout = config.retries.request_timeout();
            let result = match tokio::time::timeout(timeout, operation(connection)).await {
                Ok(result) => result,
                Err(_) => Err(RpcError::Timeout(timeout)),
            };

            match result {
                Ok(value) => {
                    in_flight.settle(Ok(()));
                    tracing::debug!(
                        call_id = %call_id,
                        url = %in_flight.url,
                        attempt,
                        "RPC call succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => {
                    let consecutive = in_flight.settle(Err(&err)).unwrap_or(0);
                    if attempt >= max_retries {
                        tracing::error!(
                            call_id = %call_id,
                            url = %in_flight.url,
                            attempts = attempt + 1,
                            error = %err,
                            "RPC call failed, retries exhausted"
                        );
                        return Err(err);
                    }

                    let delay = backoff_for(consecutive, &config.retries);
                    tracing::warn!(
                        call_id = %call_id,
                        url = %in_flight.url,
                        attempt,
                        delay = ?delay,
                        error = %err,
                        "RPC attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn manager(urls: &[&str]) -> RpcManager {
        let config = ManagerConfig {
            endpoints: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        };
        RpcManager::new(config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_endpoints() {
        let m = manager(&[]);
        let result: RpcResult<()> = m.execute_with_fallback(|_| async { Ok(()) }).await;
        assert!(matches!(result, Err(RpcError::NoEndpoints)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let m = manager(&["https://rpc-a.test/rpc"]);
        let value = m
            .execute_with_fallback(|conn| async move { Ok(conn.url().to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "https://rpc-a.test/rpc");

        let snap = m.endpoint_snapshot("https://rpc-a.test/rpc").unwrap();
        assert_eq!(snap.request_count, 1);
        assert_eq!(m.pending_requests(), 0);
        assert_eq!(m.lock_state().global_log.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound() {
        let m = manager(&["https://rpc-a.test/rpc", "https://rpc-b.test/rpc"]);
        let calls = AtomicU32::new(0);
        let result: RpcResult<()> = m
            .execute_with_retries(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(RpcError::Other("boom".into())) }
                },
                2,
            )
            .await;

        assert!(matches!(result, Err(RpcError::Other(ref m)) if m == "boom"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(m.pending_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unclassified_failure() {
        let mut config = ManagerConfig {
            endpoints: vec!["https://rpc-a.test/rpc".into()],
            ..Default::default()
        };
        config.retries.request_timeout_secs = 1;
        let m = RpcManager::new(config).unwrap();

        let result: RpcResult<()> = m
            .execute_with_retries(
                |_| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                },
                0,
            )
            .await;

        assert!(matches!(result, Err(RpcError::Timeout(_))));
        let snap = m.endpoint_snapshot("https://rpc-a.test/rpc").unwrap();
        assert_eq!(snap.consecutive_errors, 1);
        assert!(snap.cooldown_until.is_none());
        assert_eq!(m.pending_requests(), 0);
    }
}
