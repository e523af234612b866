//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::{ready, Ready};
use std::sync::{Arc, Mutex};

use rpc_manager::{ManagerConfig, RpcConnection, RpcError, RpcManager, RpcResult};

pub const A: &str = "https://rpc-a.test/rpc";
pub const B: &str = "https://rpc-b.test/rpc";
pub const C: &str = "https://rpc-c.test/rpc";

/// Config with the given endpoints and default tunables.
pub fn config(urls: &[&str]) -> ManagerConfig {
    ManagerConfig {
        endpoints: urls.iter().map(|u| u.to_string()).collect(),
        ..Default::default()
    }
}

pub fn manager(urls: &[&str]) -> RpcManager {
    RpcManager::new(config(urls)).unwrap()
}

pub fn http_error(status: u16) -> RpcError {
    RpcError::Http {
        status,
        message: format!("upstream returned {}", status),
    }
}

/// Upstream whose responses are scripted per endpoint URL.
///
/// Endpoints without a queued response answer `Ok(1)`.
#[derive(Clone, Default)]
pub struct ScriptedUpstream {
    inner: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    responses: HashMap<String, VecDeque<RpcResult<u64>>>,
    calls: Vec<String>,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, result: RpcResult<u64>) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .responses
            .entry(url.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn call(&self, conn: RpcConnection) -> Ready<RpcResult<u64>> {
        let url = conn.url().to_string();
        let mut script = self.inner.lock().unwrap();
        script.calls.push(url.clone());
        let result = script
            .responses
            .get_mut(&url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(1));
        ready(result)
    }

    /// URLs in dispatch order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }
}
