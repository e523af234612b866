//! Periodic endpoint maintenance.
//!
//! # Responsibilities
//! - Probe endpoints outside cooldown and log the result
//! - Recompute success rate and latency from the trailing window
//! - Prune request logs past their retention
//!
//! Probes bypass the retry path and never propagate failures.

use futures_util::future::join_all;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::blockchain::types::RpcError;
use crate::manager::RpcManager;
use crate::observability::metrics;

/// Background task driving the three maintenance timers.
pub struct Maintainer {
    manager: RpcManager,
}

fn ticker(period: Duration) -> time::Interval {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

impl Maintainer {
    pub fn new(manager: RpcManager) -> Self {
        Self { manager }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let config = self.manager.config().maintenance.clone();
        if !config.enabled {
            tracing::info!("Endpoint maintenance disabled");
            return;
        }

        tracing::info!(
            probe_interval = config.probe_interval_secs,
            recompute_interval = config.recompute_interval_secs,
            prune_interval = config.prune_interval_secs,
            "Endpoint maintainer starting"
        );

        let mut probe = ticker(Duration::from_secs(config.probe_interval_secs));
        let mut recompute = ticker(Duration::from_secs(config.recompute_interval_secs));
        let mut prune = ticker(Duration::from_secs(config.prune_interval_secs));

        // At most one probe round in flight, on its own task.
        let mut probing: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Endpoint maintainer received shutdown signal, exiting loop");
                    break;
                }
                _ = probe.tick() => {
                    if probing.as_ref().is_some_and(|round| !round.is_finished()) {
                        tracing::debug!("Previous probe round still running, skipping tick");
                        continue;
                    }
                    let manager = self.manager.clone();
                    probing = Some(tokio::spawn(async move { manager.probe_endpoints().await }));
                }
                _ = recompute.tick() => self.manager.recompute_stats(),
                _ = prune.tick() => self.manager.prune_logs(),
            }
        }

        if let Some(round) = probing {
            round.abort();
        }
    }
}

impl RpcManager {
    /// Probe every endpoint not in cooldown, concurrently.
    pub async fn probe_endpoints(&self) {
        let config = self.config();
        let timeout = Duration::from_secs(config.maintenance.probe_timeout_secs);

        let targets: Vec<_> = {
            let state = self.lock_state();
            let now = Instant::now();
            state
                .registry
                .iter()
                .filter(|ep| !ep.in_cooldown(now))
                .map(|ep| (ep.url.clone(), ep.connection.clone()))
                .collect()
        };

        let probes = targets.into_iter().map(|(url, connection)| {
            let probe = self.shared.probe.clone();
            async move {
                let started = Instant::now();
                let result = match time::timeout(timeout, probe(connection)).await {
                    Ok(result) => result,
                    Err(_) => Err(RpcError::Timeout(timeout)),
                };
                (url, started.elapsed(), result)
            }
        });
        let results = join_all(probes).await;

        let mut state = self.lock_state();
        let finished = Instant::now();
        for (url, elapsed, result) in results {
            metrics::record_probe(&url, result.is_ok());
            // Removed while the probe was running.
            let Some(ep) = state.registry.find_mut(&url) else {
                continue;
            };
            ep.record_probe(finished, result.is_ok(), elapsed);
            match result {
                Ok(()) => {
                    ep.error_count = (ep.error_count - 1.0).max(0.0);
                    ep.consecutive_errors = 0;
                    tracing::debug!(url = %url, latency = ?elapsed, "Health probe succeeded");
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Health probe failed");
                }
            }
        }
    }

    /// Recompute derived stats from the trailing stats window.
    pub fn recompute_stats(&self) {
        let window = self.config().maintenance.stats_window();
        let mut state = self.lock_state();
        let now = Instant::now();
        for ep in state.registry.iter_mut() {
            ep.recompute_stats(now, window);
        }
    }

    /// Drop request log entries past their retention windows.
    pub fn prune_logs(&self) {
        let config = self.config();
        let retention = config.maintenance.log_retention();
        let mut state = self.lock_state();
        let now = Instant::now();
        for ep in state.registry.iter_mut() {
            ep.prune_log(now, retention);
        }
        state.global_log.prune(now, config.limits.window());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::client::{Probe, RpcConnection};
    use crate::config::ManagerConfig;
    use crate::lifecycle::Shutdown;
    use futures_util::future::FutureExt;
    use std::sync::Arc;

    /// Probe that fails for URLs containing "down".
    fn scripted_probe() -> Probe {
        Arc::new(|conn: RpcConnection| {
            async move {
                if conn.url().as_str().contains("down") {
                    Err(RpcError::Transport("connection refused".into()))
                } else {
                    Ok(())
                }
            }
            .boxed()
        })
    }

    fn manager(urls: &[&str]) -> RpcManager {
        let config = ManagerConfig {
            endpoints: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        };
        RpcManager::with_probe(config, scripted_probe()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_updates_stats() {
        let m = manager(&["https://up.test/rpc", "https://down.test/rpc", "https://cool.test/rpc"]);
        {
            let mut state = m.lock_state();
            let up = state.registry.find_mut("https://up.test/rpc").unwrap();
            up.error_count = 1.5;
            up.consecutive_errors = 2;
            let cool = state.registry.find_mut("https://cool.test/rpc").unwrap();
            cool.cooldown_until = Some(Instant::now() + Duration::from_secs(30));
        }

        m.probe_endpoints().await;

        let up = m.endpoint_snapshot("https://up.test/rpc").unwrap();
        assert_eq!(up.error_count, 0.5);
        assert_eq!(up.consecutive_errors, 0);
        assert_eq!(up.log_len, 1);
        // Probes are not dispatched attempts.
        assert_eq!(up.request_count, 0);

        let down = m.endpoint_snapshot("https://down.test/rpc").unwrap();
        assert_eq!(down.log_len, 1);
        assert_eq!(down.error_count, 0.0);

        let cool = m.endpoint_snapshot("https://cool.test/rpc").unwrap();
        assert_eq!(cool.log_len, 0);

        m.recompute_stats();
        assert_eq!(m.endpoint_snapshot("https://down.test/rpc").unwrap().success_rate, 0.0);
        assert_eq!(m.endpoint_snapshot("https://up.test/rpc").unwrap().success_rate, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_logs() {
        let m = manager(&["https://up.test/rpc"]);
        tokio::time::advance(Duration::from_secs(7200)).await;
        m.probe_endpoints().await;
        tokio::time::advance(Duration::from_secs(3601)).await;
        m.probe_endpoints().await;

        assert_eq!(m.endpoint_snapshot("https://up.test/rpc").unwrap().log_len, 2);
        m.prune_logs();
        assert_eq!(m.endpoint_snapshot("https://up.test/rpc").unwrap().log_len, 1);
    }

    /// Probe that never answers within the test.
    fn hanging_probe() -> Probe {
        Arc::new(|_conn: RpcConnection| futures_util::future::pending().boxed())
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_round_does_not_block_other_timers() {
        let mut config = ManagerConfig {
            endpoints: vec!["https://rpc-a.test/rpc".into()],
            ..Default::default()
        };
        config.maintenance.probe_timeout_secs = 3600;
        let m = RpcManager::with_probe(config, hanging_probe()).unwrap();
        let shutdown = Shutdown::new();
        let handle = m.start_maintenance(shutdown.subscribe());

        // The probe round starts at 120s and hangs.
        tokio::time::sleep(Duration::from_secs(130)).await;
        let failed: crate::blockchain::types::RpcResult<()> = m
            .execute_with_retries(|_| async { Err(RpcError::Other("boom".into())) }, 0)
            .await;
        assert!(failed.is_err());
        assert_eq!(m.endpoint_snapshot("https://rpc-a.test/rpc").unwrap().success_rate, 1.0);

        // Recompute still fires at 180s.
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(m.endpoint_snapshot("https://rpc-a.test/rpc").unwrap().success_rate, 0.0);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("maintainer did not stop while a probe round was running")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_entries_keep_log_time_ordered() {
        let slow_probe: Probe = Arc::new(|_conn: RpcConnection| {
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            }
            .boxed()
        });
        let config = ManagerConfig {
            endpoints: vec!["https://rpc-a.test/rpc".into()],
            ..Default::default()
        };
        let m = RpcManager::with_probe(config, slow_probe).unwrap();

        // A call dispatched while the probe is still in flight.
        tokio::join!(m.probe_endpoints(), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            m.execute_with_fallback(|_| async { Ok::<_, RpcError>(()) })
                .await
                .unwrap();
        });

        let state = m.lock_state();
        let ep = state.registry.get(0).unwrap();
        assert_eq!(ep.request_log.len(), 2);
        assert!(ep
            .request_log
            .iter()
            .zip(ep.request_log.iter().skip(1))
            .all(|(a, b)| a.timestamp <= b.timestamp));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_and_stops_on_shutdown() {
        let m = manager(&["https://down.test/rpc"]);
        let shutdown = Shutdown::new();
        let handle = m.start_maintenance(shutdown.subscribe());

        // First probe at 120s, first recompute at 60s and 180s.
        tokio::time::sleep(Duration::from_secs(200)).await;
        let snap = m.endpoint_snapshot("https://down.test/rpc").unwrap();
        assert_eq!(snap.log_len, 1);
        assert_eq!(snap.success_rate, 0.0);

        shutdown.trigger();
        handle.await.unwrap();
    }
}
