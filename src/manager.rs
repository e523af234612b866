//! The RPC connection manager.
//!
//! # Responsibilities
//! - Own the endpoint registry, global request log and in-flight counter
//! - Expose the administrative surface (add/remove/prioritize, status)
//! - Hold hot-swappable tunables
//!
//! # Design Decisions
//! - Built once at the composition root and cloned into callers
//! - All counters sit behind one mutex that is never held across an await
//! - Tunables live in an `ArcSwap` so reloads never contend with traffic

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::blockchain::client::{block_number_probe, Probe};
use crate::blockchain::types::{RpcError, RpcResult};
use crate::config::validation::{parse_endpoint_url, validate_config};
use crate::config::ManagerConfig;
use crate::endpoint::registry::EndpointRegistry;
use crate::endpoint::state::GlobalRequestLog;
use crate::health::maintainer::Maintainer;
use crate::health::status::{EndpointReport, EndpointSnapshot, StatusReport};

/// Mutable state shared by every call path.
#[derive(Debug, Default)]
pub struct ManagerState {
    pub registry: EndpointRegistry,
    pub global_log: GlobalRequestLog,
    pub pending_requests: usize,
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<ManagerState>,
    pub(crate) config: ArcSwap<ManagerConfig>,
    pub(crate) probe: Probe,
}

/// Client-side resilience layer over a set of upstream RPC endpoints.
#[derive(Clone)]
pub struct RpcManager {
    pub(crate) shared: Arc<Shared>,
}

impl RpcManager {
    /// Create a manager with the default `eth_blockNumber` health probe.
    pub fn new(config: ManagerConfig) -> RpcResult<Self> {
        Self::with_probe(config, block_number_probe())
    }

    /// Create a manager with a custom health probe.
    ///
    /// The config is validated first; a zero ceiling would throttle every call forever.
    pub fn with_probe(config: ManagerConfig, probe: Probe) -> RpcResult<Self> {
        check_config(&config)?;
        let mut state = ManagerState::default();
        for raw in &config.endpoints {
            let url = parse_endpoint_url(raw).map_err(|reason| RpcError::InvalidUrl {
                url: raw.clone(),
                reason,
            })?;
            state.registry.add(url);
        }

        tracing::info!(
            endpoints = state.registry.len(),
            max_per_endpoint = config.limits.max_per_endpoint,
            max_global = config.limits.max_global,
            max_concurrent = config.limits.max_concurrent,
            max_retries = config.retries.max_retries,
            "RPC manager initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                config: ArcSwap::from_pointee(config),
                probe,
            }),
        })
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.shared.state.lock().expect("manager state mutex poisoned")
    }

    /// Current tunables.
    pub fn config(&self) -> Arc<ManagerConfig> {
        self.shared.config.load_full()
    }

    /// Replace the tunables. The endpoint list is left alone; see `apply_config`.
    pub fn update_settings(&self, config: ManagerConfig) -> RpcResult<()> {
        check_config(&config)?;
        self.shared.config.store(Arc::new(config));
        tracing::info!("RPC manager settings updated");
        Ok(())
    }

    /// Apply a reloaded config: sync the endpoint list and swap the tunables.
    ///
    /// Nothing changes if the config is invalid.
    pub fn apply_config(&self, config: ManagerConfig) -> RpcResult<()> {
        check_config(&config)?;
        self.sync_endpoints(&config.endpoints)?;
        self.shared.config.store(Arc::new(config));
        tracing::info!(endpoints = self.endpoint_urls().len(), "RPC manager config applied");
        Ok(())
    }

    /// Register an endpoint. Returns false if it was already present.
    pub fn add_endpoint(&self, url: &str) -> RpcResult<bool> {
        let parsed = parse_endpoint_url(url).map_err(|reason| RpcError::InvalidUrl {
            url: url.to_string(),
            reason,
        })?;
        let added = self.lock_state().registry.add(parsed);
        if added {
            tracing::info!(url = %url, "Endpoint added");
        }
        Ok(added)
    }

    /// Remove an endpoint and its stats. Returns false if it was not registered.
    pub fn remove_endpoint(&self, url: &str) -> bool {
        let mut state = self.lock_state();
        let removed = state.registry.remove(url, Instant::now());
        if removed {
            tracing::info!(
                url = %url,
                current = ?state.registry.current_url(),
                "Endpoint removed"
            );
        }
        removed
    }

    /// Operator override: clear the endpoint's error state and make it current.
    pub fn prioritize_endpoint(&self, url: &str) -> RpcResult<()> {
        self.lock_state().registry.prioritize(url)?;
        tracing::info!(url = %url, "Endpoint prioritized");
        Ok(())
    }

    /// Make the registry match `urls`: add missing entries, drop the rest.
    ///
    /// Surviving endpoints keep their stats.
    pub fn sync_endpoints(&self, urls: &[String]) -> RpcResult<()> {
        let parsed = urls
            .iter()
            .map(|raw| {
                parse_endpoint_url(raw).map_err(|reason| RpcError::InvalidUrl {
                    url: raw.clone(),
                    reason,
                })
            })
            .collect::<RpcResult<Vec<_>>>()?;
        let wanted: Vec<String> = parsed.iter().map(|u| u.to_string()).collect();

        let mut state = self.lock_state();
        let now = Instant::now();
        for existing in state.registry.urls() {
            if !wanted.contains(&existing) {
                state.registry.remove(&existing, now);
                tracing::info!(url = %existing, "Endpoint removed by config sync");
            }
        }
        for (url, key) in parsed.into_iter().zip(wanted) {
            if state.registry.add(url) {
                tracing::info!(url = %key, "Endpoint added by config sync");
            }
        }
        Ok(())
    }

    /// Re-run health scoring, update the current endpoint and return its URL.
    pub fn select_best_endpoint(&self) -> Option<String> {
        let mut state = self.lock_state();
        let idx = state.registry.select_best(Instant::now())?;
        state.registry.get(idx).map(|ep| ep.url.clone())
    }

    pub fn current_endpoint(&self) -> Option<String> {
        self.lock_state().registry.current_url().map(str::to_string)
    }

    /// In-flight attempts across all callers.
    pub fn pending_requests(&self) -> usize {
        self.lock_state().pending_requests
    }

    pub fn endpoint_urls(&self) -> Vec<String> {
        self.lock_state().registry.urls()
    }

    /// Status of every endpoint, computed now.
    pub fn endpoint_status(&self) -> StatusReport {
        let state = self.lock_state();
        let now = Instant::now();
        StatusReport {
            current_endpoint: state.registry.current_url().map(str::to_string),
            endpoints: state
                .registry
                .iter()
                .map(|ep| EndpointReport {
                    url: ep.url.clone(),
                    status: ep.status(now),
                    success_rate: ep.success_rate,
                    avg_response_time: ep.avg_response_time,
                    error_count: ep.error_count,
                    in_cooldown: ep.in_cooldown(now),
                })
                .collect(),
        }
    }

    /// Full counters of one endpoint.
    pub fn endpoint_snapshot(&self, url: &str) -> Option<EndpointSnapshot> {
        let state = self.lock_state();
        let now = Instant::now();
        let ep = state.registry.get(state.registry.position(url)?)?;
        Some(EndpointSnapshot {
            url: ep.url.clone(),
            status: ep.status(now),
            request_count: ep.request_count,
            error_count: ep.error_count,
            consecutive_errors: ep.consecutive_errors,
            success_rate: ep.success_rate,
            avg_response_time: ep.avg_response_time,
            last_request_time: ep.last_request_time,
            last_error_time: ep.last_error_time,
            cooldown_until: ep.cooldown_until,
            cooldown_remaining: ep.cooldown_remaining(now),
            log_len: ep.request_log.len(),
        })
    }

    /// Spawn the periodic maintainer. It exits when `shutdown` fires.
    pub fn start_maintenance(&self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let maintainer = Maintainer::new(self.clone());
        tokio::spawn(maintainer.run(shutdown))
    }
}

fn check_config(config: &ManagerConfig) -> RpcResult<()> {
    validate_config(config).map_err(|errors| {
        RpcError::InvalidConfig(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        )
    })
}

impl std::fmt::Debug for RpcManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("RpcManager")
            .field("endpoints", &state.registry.urls())
            .field("current", &state.registry.current_url())
            .field("pending_requests", &state.pending_requests)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(urls: &[&str]) -> RpcManager {
        let config = ManagerConfig {
            endpoints: urls.iter().map(|u| u.to_string()).collect(),
            ..Default::default()
        };
        RpcManager::new(config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_registers_endpoints_in_order() {
        let m = manager(&["https://rpc-a.test/rpc", "https://rpc-b.test/rpc"]);
        assert_eq!(
            m.endpoint_urls(),
            vec!["https://rpc-a.test/rpc", "https://rpc-b.test/rpc"]
        );
        assert_eq!(m.current_endpoint().as_deref(), Some("https://rpc-a.test/rpc"));
        assert_eq!(m.pending_requests(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_rejects_bad_url() {
        let config = ManagerConfig {
            endpoints: vec!["not a url".into()],
            ..Default::default()
        };
        assert!(matches!(RpcManager::new(config), Err(RpcError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_rejects_zero_limits() {
        let mut config = ManagerConfig {
            endpoints: vec!["https://rpc-a.test/rpc".into()],
            ..Default::default()
        };
        config.limits.max_concurrent = 0;
        let err = RpcManager::new(config.clone()).unwrap_err();
        assert!(matches!(err, RpcError::InvalidConfig(ref msg) if msg.contains("limits.max_concurrent")));

        config.limits.max_concurrent = 10;
        config.limits.max_per_endpoint = 0;
        assert!(matches!(RpcManager::new(config), Err(RpcError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_settings_keeps_valid_tunables() {
        let m = manager(&["https://rpc-a.test/rpc"]);
        let mut bad = ManagerConfig::default();
        bad.limits.max_global = 0;
        assert!(m.update_settings(bad).is_err());
        assert_eq!(m.config().limits.max_global, 100);

        let mut good = ManagerConfig::default();
        good.limits.max_global = 7;
        m.update_settings(good).unwrap();
        assert_eq!(m.config().limits.max_global, 7);
        // Tunables only; the endpoint list stays.
        assert_eq!(m.endpoint_urls(), vec!["https://rpc-a.test/rpc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_config_is_all_or_nothing() {
        let m = manager(&["https://rpc-a.test/rpc"]);

        let mut bad = ManagerConfig {
            endpoints: vec!["https://rpc-b.test/rpc".into()],
            ..Default::default()
        };
        bad.retries.request_timeout_secs = 0;
        assert!(matches!(m.apply_config(bad), Err(RpcError::InvalidConfig(_))));
        assert_eq!(m.endpoint_urls(), vec!["https://rpc-a.test/rpc"]);

        let mut good = ManagerConfig {
            endpoints: vec!["https://rpc-b.test/rpc".into()],
            ..Default::default()
        };
        good.retries.max_retries = 1;
        m.apply_config(good).unwrap();
        assert_eq!(m.endpoint_urls(), vec!["https://rpc-b.test/rpc"]);
        assert_eq!(m.config().retries.max_retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_remove_integrity() {
        let m = manager(&["https://rpc-a.test/rpc"]);
        let before = m.endpoint_status().endpoints.len();

        assert!(m.add_endpoint("https://rpc-b.test/rpc").unwrap());
        assert!(!m.add_endpoint("https://rpc-b.test/rpc").unwrap());
        assert!(m.remove_endpoint("https://rpc-b.test/rpc"));

        let report = m.endpoint_status();
        assert_eq!(report.endpoints.len(), before);
        assert!(m.endpoint_snapshot("https://rpc-b.test/rpc").is_none());
        assert!(m.add_endpoint("mailto:ops@example.com").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_endpoints_keeps_survivor_stats() {
        let m = manager(&["https://rpc-a.test/rpc", "https://rpc-b.test/rpc"]);
        m.lock_state().registry.find_mut("https://rpc-b.test/rpc").unwrap().error_count = 2.0;

        m.sync_endpoints(&["https://rpc-b.test/rpc".into(), "https://rpc-c.test/rpc".into()])
            .unwrap();

        assert_eq!(
            m.endpoint_urls(),
            vec!["https://rpc-b.test/rpc", "https://rpc-c.test/rpc"]
        );
        assert_eq!(m.endpoint_snapshot("https://rpc-b.test/rpc").unwrap().error_count, 2.0);
        assert!(m.current_endpoint().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_report() {
        let m = manager(&["https://rpc-a.test/rpc", "https://rpc-b.test/rpc"]);
        {
            let mut state = m.lock_state();
            let a = state.registry.find_mut("https://rpc-a.test/rpc").unwrap();
            a.cooldown_until = Some(Instant::now() + std::time::Duration::from_secs(30));
        }
        let report = m.endpoint_status();
        assert_eq!(report.current_endpoint.as_deref(), Some("https://rpc-a.test/rpc"));
        assert!(report.endpoints[0].in_cooldown);
        assert!(!report.endpoints[1].in_cooldown);

        assert_eq!(m.select_best_endpoint().as_deref(), Some("https://rpc-b.test/rpc"));
        assert_eq!(m.current_endpoint().as_deref(), Some("https://rpc-b.test/rpc"));

        let json = serde_json::to_value(m.endpoint_status()).unwrap();
        assert_eq!(json["endpoints"][0]["status"], "cooldown");
        assert_eq!(json["endpoints"][1]["status"], "healthy");
    }
}
