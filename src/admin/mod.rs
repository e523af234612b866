//! Admin HTTP API.
//!
//! ```text
//! GET    /admin/status                 → endpoint status report
//! POST   /admin/endpoints              → add endpoint      {"url": ...}
//! DELETE /admin/endpoints              → remove endpoint   {"url": ...}
//! POST   /admin/endpoints/prioritize   → operator override {"url": ...}
//! ```
//!
//! Every route requires `Authorization: Bearer <api_key>`. The key is read
//! from the manager's live config, so a reload rotates it.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::manager::RpcManager;

/// State injected into admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub manager: RpcManager,
}

#[allow(deprecated)]
pub fn setup_admin_router(manager: RpcManager) -> Router {
    let timeout = Duration::from_secs(manager.config().admin.request_timeout_secs);
    let state = AdminState { manager };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/endpoints", post(add_endpoint).delete(remove_endpoint))
        .route("/admin/endpoints/prioritize", post(prioritize_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve_admin(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}
