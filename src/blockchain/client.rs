//! Connection handles handed to RPC operations.
//!
//! # Responsibilities
//! - Build one alloy provider per endpoint URL
//! - Expose the provider to caller-supplied operations
//! - Provide the default lightweight health probe

use alloy::providers::{Provider, ProviderBuilder};
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use url::Url;

use crate::blockchain::types::{RpcError, RpcResult};

/// Live connection to a single upstream endpoint.
///
/// Cloning is cheap; the provider is shared.
#[derive(Clone)]
pub struct RpcConnection {
    url: Url,
    provider: Arc<dyn Provider + Send + Sync>,
}

impl RpcConnection {
    /// Build a connection for the given endpoint URL.
    ///
    /// No network traffic happens here; the provider connects lazily.
    pub fn connect(url: Url) -> Self {
        let provider = Arc::new(ProviderBuilder::new().connect_http(url.clone()))
            as Arc<dyn Provider + Send + Sync>;
        Self { url, provider }
    }

    /// Endpoint URL this connection talks to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The underlying provider.
    pub fn provider(&self) -> &(dyn Provider + Send + Sync) {
        self.provider.as_ref()
    }
}

impl std::fmt::Debug for RpcConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcConnection")
            .field("url", &self.url.as_str())
            .finish()
    }
}

/// Health probe issued directly against an endpoint by the maintainer.
pub type Probe = Arc<dyn Fn(RpcConnection) -> BoxFuture<'static, RpcResult<()>> + Send + Sync>;

/// Default probe: a single `eth_blockNumber` call.
pub fn block_number_probe() -> Probe {
    Arc::new(|conn: RpcConnection| {
        async move {
            conn.provider()
                .get_block_number()
                .await
                .map(|_| ())
                .map_err(RpcError::from)
        }
        .boxed()
    })
}
