//! HTTP binding for resource definitions
//!
//! [`router`] exposes one definition at its collection and single-record
//! paths. Every method is routed to the pipeline, which answers unsupported
//! ones with `405` and an `Allow` header. Routers for several definitions are
//! combined with [`Router::merge`] and run with [`Server`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};

use crate::config::Config;
use crate::error::Result;
use crate::resource::{handle, Payload, RequestParts, ResourceDef};
use crate::store::Store;

/// Router serving `def` at both of its route patterns
pub fn router<S: Store>(def: Arc<ResourceDef<S>>) -> Router {
    let (collection, single) = def.route_patterns();
    tracing::debug!(
        resource = %def.full_name(),
        collection = %collection,
        single = %single,
        "Mounting resource"
    );

    Router::new()
        .route(&collection, any(dispatch::<S>))
        .route(&single, any(dispatch::<S>))
        .with_state(def)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
}

async fn dispatch<S: Store>(
    State(def): State<Arc<ResourceDef<S>>>,
    method: Method,
    headers: HeaderMap,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Payload> {
    let parts = RequestParts {
        method,
        ids: path
            .map(|Path(ids)| ids.into_iter().collect())
            .unwrap_or_default(),
        query,
        headers,
        body,
    };
    handle(def, parts).await
}

/// HTTP server with graceful shutdown
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serve `app` on `service.port` until SIGINT or SIGTERM
    pub async fn serve(self, app: Router) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.service.port));

        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("Serving {} on {}", self.config.service.name, addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, draining requests"),
        _ = terminate => tracing::info!("Received SIGTERM, draining requests"),
    }
}
