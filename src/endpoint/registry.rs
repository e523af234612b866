//! Ordered endpoint registry.
//!
//! # Responsibilities
//! - Own the candidate endpoint list and one stats record per endpoint
//! - Track which endpoint is current
//! - Add, remove and prioritize endpoints
//!
//! Stats live inside the endpoint record, so removing an endpoint can never
//! leave an orphaned stats entry behind.

use tokio::time::Instant;
use url::Url;

use crate::blockchain::client::RpcConnection;
use crate::blockchain::types::{RpcError, RpcResult};
use crate::endpoint::state::EndpointState;
use crate::health::scorer;

/// Normalized lookup key for a URL string.
pub(crate) fn endpoint_key(raw: &str) -> String {
    Url::parse(raw)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: Vec<EndpointState>,
    current: Option<usize>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an endpoint with fresh stats. Returns false if already present.
    pub fn add(&mut self, url: Url) -> bool {
        let key = url.to_string();
        if self.position(&key).is_some() {
            return false;
        }
        self.endpoints.push(EndpointState::new(RpcConnection::connect(url)));
        if self.current.is_none() {
            self.current = Some(self.endpoints.len() - 1);
        }
        true
    }

    /// Remove an endpoint and its stats. Returns false if it was not present.
    pub fn remove(&mut self, url: &str, now: Instant) -> bool {
        let Some(idx) = self.position(url) else {
            return false;
        };
        self.endpoints.remove(idx);

        match self.current {
            Some(cur) if cur == idx => {
                self.current = None;
                self.select_best(now);
            }
            Some(cur) if cur > idx => self.current = Some(cur - 1),
            _ => {}
        }
        true
    }

    /// Clear an endpoint's error state and make it current, bypassing scoring.
    pub fn prioritize(&mut self, url: &str) -> RpcResult<()> {
        let idx = self
            .position(url)
            .ok_or_else(|| RpcError::UnknownEndpoint(url.to_string()))?;
        let ep = &mut self.endpoints[idx];
        ep.error_count = 0.0;
        ep.consecutive_errors = 0;
        ep.cooldown_until = None;
        self.current = Some(idx);
        Ok(())
    }

    /// Re-run scoring and make the winner current.
    pub fn select_best(&mut self, now: Instant) -> Option<usize> {
        self.current = scorer::select_best(&self.endpoints, now);
        self.current
    }

    pub fn position(&self, url: &str) -> Option<usize> {
        let key = endpoint_key(url);
        self.endpoints.iter().position(|ep| ep.url == key)
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current.map(|idx| self.endpoints[idx].url.as_str())
    }

    pub fn get(&self, idx: usize) -> Option<&EndpointState> {
        self.endpoints.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut EndpointState> {
        self.endpoints.get_mut(idx)
    }

    pub fn find_mut(&mut self, url: &str) -> Option<&mut EndpointState> {
        let idx = self.position(url)?;
        self.endpoints.get_mut(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointState> {
        self.endpoints.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EndpointState> {
        self.endpoints.iter_mut()
    }

    pub fn urls(&self) -> Vec<String> {
        self.endpoints.iter().map(|ep| ep.url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
