//! HTTP server for the Bulkbuy API

use crate::api::create_routes;
use crate::dispatch::{forward_panic, PanicGuard};
use crate::handlers::AppState;
use crate::middleware::rate_limit::{spawn_pruner, InMemoryRateLimitStore, RateLimitStore};
use crate::pipeline::{run_pipeline, Pipeline};
use axum::middleware::from_fn_with_state;
use axum::Router;
use bulkbuy_core::{BulkbuyConfig, BulkbuyError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::info;

/// Bulkbuy HTTP server
pub struct BulkbuyServer {
    config: BulkbuyConfig,
    app: Router,
    rate_store: Arc<dyn RateLimitStore>,
}

impl BulkbuyServer {
    /// Create a server over `state`, counting requests in `rate_store`
    pub fn new(
        config: BulkbuyConfig,
        state: AppState,
        rate_store: Arc<dyn RateLimitStore>,
    ) -> Self {
        let app = create_app(&config, state, rate_store.clone());
        Self {
            config,
            app,
            rate_store,
        }
    }

    /// Bind and serve until Ctrl-C or SIGTERM
    pub async fn start(self) -> Result<()> {
        let addr = self.config.bind_address();
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| BulkbuyError::validation(format!("Invalid address {}: {}", addr, e)))?;

        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .map_err(|e| BulkbuyError::network(format!("Failed to bind to {}: {}", addr, e)))?;

        info!(
            address = %addr,
            mode = %self.config.mode,
            "Bulkbuy API listening"
        );

        let window = Duration::from_secs(self.config.rate_limit.window_secs.max(1));
        let pruner = spawn_pruner(self.rate_store.clone(), window);

        let served = axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        pruner.abort();
        served.map_err(|e| BulkbuyError::network(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the server configuration
    pub fn config(&self) -> &BulkbuyConfig {
        &self.config
    }

    /// The assembled application, for driving without a socket
    pub fn app(&self) -> Router {
        self.app.clone()
    }
}

/// Assemble the pipeline, the routes and both panic guards
///
/// The pipeline wraps the router as a whole rather than being layered onto
/// it, so path and query rewrites happen before routing.
pub fn create_app(
    config: &BulkbuyConfig,
    state: AppState,
    rate_store: Arc<dyn RateLimitStore>,
) -> Router {
    let pipeline = Arc::new(Pipeline::from_config(config, rate_store));
    let funnel = pipeline.funnel();

    let router = create_routes()
        .with_state(state)
        .layer(CatchPanicLayer::custom(forward_panic));

    let app = ServiceBuilder::new()
        .layer(CatchPanicLayer::custom(PanicGuard::new(funnel)))
        .layer(from_fn_with_state(pipeline, run_pipeline))
        .service(router);

    Router::new().fallback_service(app)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Server builder for configuration
pub struct ServerBuilder {
    config: BulkbuyConfig,
    state: Option<AppState>,
    rate_store: Option<Arc<dyn RateLimitStore>>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: BulkbuyConfig::default(),
            state: None,
            rate_store: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: BulkbuyConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the host address
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.server.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set the application state; in-memory stores otherwise
    pub fn state(mut self, state: AppState) -> Self {
        self.state = Some(state);
        self
    }

    /// Set the rate limit window store; process-local otherwise
    pub fn rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_store = Some(store);
        self
    }

    pub fn build(self) -> BulkbuyServer {
        let state = self.state.unwrap_or_else(AppState::in_memory);
        let rate_store = self
            .rate_store
            .unwrap_or_else(|| Arc::new(InMemoryRateLimitStore::new()));
        BulkbuyServer::new(self.config, state, rate_store)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
