//! HTTP command surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::api::routes;
use crate::error::{Error, Result};
use crate::services::ServiceContainer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<ServiceContainer>,
}

impl AppState {
    pub fn new(services: Arc<ServiceContainer>) -> Self {
        Self { services }
    }
}

/// Build the router with all middleware and routes.
pub fn build_router(state: AppState) -> Router {
    routes::create_router(state).layer(TraceLayer::new_for_http())
}

pub struct ApiServer {
    addr: SocketAddr,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, state: AppState, cancel_token: CancellationToken) -> Self {
        Self {
            addr,
            state,
            cancel_token,
        }
    }

    /// Bind the listener and serve in the background until stopped.
    pub async fn spawn(self) -> Result<ApiHandle> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!("API server listening on http://{}", local_addr);

        let router = build_router(self.state);
        let cancel_token = self.cancel_token.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_token.cancelled().await;
                    tracing::info!("API server shutting down...");
                })
                .await
                .map_err(|e| Error::Other(format!("Server error: {e}")))
        });

        Ok(ApiHandle {
            local_addr,
            cancel_token: self.cancel_token,
            task,
        })
    }
}

/// A running [`ApiServer`].
pub struct ApiHandle {
    local_addr: SocketAddr,
    cancel_token: CancellationToken,
    task: JoinHandle<Result<()>>,
}

impl ApiHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait until in-flight requests are answered.
    pub async fn stop(self) -> Result<()> {
        self.cancel_token.cancel();
        self.task
            .await
            .map_err(|e| Error::Other(format!("API server task failed: {e}")))?
    }
}
