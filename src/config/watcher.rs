//! Hot reload of the manager's config file.
//!
//! File events are collapsed over a debounce window, then the file is
//! reloaded and applied to the manager as a whole: endpoint list synced and
//! tunables swapped. A file that fails to load or validate is logged and the
//! running config stays in place.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::blockchain::types::RpcError;
use crate::config::loader::{load_config, ConfigError};
use crate::manager::RpcManager;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Why a reload was not applied.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("{0}")]
    Load(ConfigError),

    #[error("{0}")]
    Apply(RpcError),
}

/// Watches a config file and applies changes to an `RpcManager`.
pub struct ConfigWatcher {
    path: PathBuf,
    manager: RpcManager,
    debounce: Duration,
}

impl ConfigWatcher {
    pub fn new(path: &Path, manager: RpcManager) -> Self {
        Self {
            path: path.to_path_buf(),
            manager,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Quiet period required after the last file event before reloading.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Load the file and apply it to the manager.
    pub fn reload(&self) -> Result<(), ReloadError> {
        let config = load_config(&self.path).map_err(ReloadError::Load)?;
        self.manager.apply_config(config).map_err(ReloadError::Apply)
    }

    /// Start watching. The task exits when `shutdown` fires.
    pub fn start(self, shutdown: broadcast::Receiver<()>) -> Result<JoinHandle<()>, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, debounce = ?self.debounce, "Config watcher started");
        Ok(tokio::spawn(self.run(watcher, event_rx, shutdown)))
    }

    async fn run(
        self,
        // Dropping the watcher stops event delivery.
        _watcher: RecommendedWatcher,
        mut events: mpsc::UnboundedReceiver<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                event = events.recv() => {
                    if event.is_none() {
                        break;
                    }
                    if !self.settle(&mut events).await {
                        break;
                    }
                    match self.reload() {
                        Ok(()) => tracing::info!(path = ?self.path, "Config reloaded"),
                        Err(e) => tracing::error!(
                            path = ?self.path,
                            error = %e,
                            "Failed to reload config, keeping current configuration"
                        ),
                    }
                }
            }
        }
        tracing::info!("Config watcher stopped");
    }

    /// Swallow follow-up events until the file has been quiet for `debounce`.
    ///
    /// Returns false if the event channel closed.
    async fn settle(&self, events: &mut mpsc::UnboundedReceiver<()>) -> bool {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.debounce) => return true,
                more = events.recv() => {
                    if more.is_none() {
                        return false;
                    }
                }
            }
        }
    }
}
