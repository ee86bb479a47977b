//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up the layer stack in pipeline order
//! - Count every response in request metrics
//! - Serve the static frontend as the routing fallback
//! - Bind server to listener with graceful shutdown
//! - Prune elapsed rate-limit windows in the background

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Request,
    handler::HandlerWithoutStateExt,
    http::Uri,
    middleware,
    routing::{any, get},
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::contact::{contact_route, SharedContactHandler};
use crate::http::error::{panic_response, ApiError};
use crate::http::health::health;
use crate::observability::metrics::track_requests;
use crate::pipeline::{run_pipeline, Pipeline};
use crate::security::headers::security_headers;
use crate::security::origin::{origin_guard, OriginPolicy};
use crate::security::rate_limit::{MemoryStore, RateLimitStore, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub contact: SharedContactHandler,
}

/// Errors building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("allowed origin is not a valid header value: {0}")]
    InvalidOrigin(#[from] axum::http::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the site and its contact API.
pub struct AppServer {
    router: Router,
    config: ServerConfig,
    limiter: Arc<RateLimiter>,
}

impl AppServer {
    /// Create a server with an in-memory rate-limit store.
    pub fn new(config: ServerConfig, contact: SharedContactHandler) -> Result<Self, ServerError> {
        Self::with_store(config, contact, Arc::new(MemoryStore::new()))
    }

    /// Create a server with a caller-supplied rate-limit store.
    pub fn with_store(
        config: ServerConfig,
        contact: SharedContactHandler,
        store: Arc<dyn RateLimitStore>,
    ) -> Result<Self, ServerError> {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), store));
        let pipeline = Arc::new(Pipeline::from_config(&config, limiter.clone()));
        let origin = OriginPolicy::new(&config.cors.allowed_origin)?;

        let router = Self::build_router(&config, AppState { contact }, pipeline, origin);
        Ok(Self {
            router,
            config,
            limiter,
        })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers added later wrap earlier ones, so the list below reads from
    /// the innermost stage outwards.
    fn build_router(
        config: &ServerConfig,
        state: AppState,
        pipeline: Arc<Pipeline>,
        origin: OriginPolicy,
    ) -> Router {
        let static_files = ServeDir::new(&config.static_files.root)
            .call_fallback_on_method_not_allowed(true)
            .fallback(not_found.into_service());

        Router::new()
            .route("/health", get(health))
            .route("/api/contact", any(contact_route))
            .fallback_service(static_files)
            .with_state(state)
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(middleware::from_fn_with_state(pipeline, run_pipeline))
            .layer(origin.cors_layer())
            .layer(middleware::from_fn_with_state(origin, origin_guard))
            .layer(middleware::from_fn(track_requests))
            .layer(middleware::from_fn(security_headers))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            allowed_origin = %self.config.cors.allowed_origin,
            static_root = %self.config.static_files.root.display(),
            "HTTP server starting"
        );

        if self.config.rate_limit.enabled {
            let limiter = self.limiter.clone();
            let stop = shutdown.resubscribe();
            tokio::spawn(prune_windows(limiter, stop));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fallback when neither a route nor a static file matched.
async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

/// Periodically drop elapsed rate-limit windows.
async fn prune_windows(limiter: Arc<RateLimiter>, mut stop: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval(limiter.window());
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = limiter.prune();
                if removed > 0 {
                    tracing::debug!(removed, "Pruned rate-limit windows");
                }
            }
            _ = stop.recv() => break,
        }
    }
}
