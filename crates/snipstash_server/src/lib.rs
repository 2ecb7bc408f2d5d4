//! HTTP server wiring for SnipStash (API, handlers, rate limiting and shared state).

/// HTTP error mapping for API handlers.
pub mod error;
/// HTTP handlers for gist and account endpoints.
pub mod handlers;
/// Per-request rate-limit middleware.
pub mod ratelimit;

pub use snipstash_core::{
    config, models, store, AppError, Config, GistStore, RateLimiter, SharedStore, DEFAULT_PORT,
};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Current store, used directly for account and counter keys.
    pub store: SharedStore,
    pub gists: Arc<GistStore>,
    pub limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Construct shared application state.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `store`: Current store handle.
    /// - `legacy`: Legacy store handle for lazy snippet migration, if any.
    ///
    /// # Returns
    /// A new [`AppState`].
    pub fn new(config: Config, store: SharedStore, legacy: Option<SharedStore>) -> Self {
        let gists = GistStore::from_config(store.clone(), legacy, &config);
        let limiter = RateLimiter::new(store.clone(), config.rate_limits);
        Self {
            config: Arc::new(config),
            store,
            gists: Arc::new(gists),
            limiter: Arc::new(limiter),
        }
    }
}

/// Create the application router with all routes and middleware.
///
/// # Arguments
/// - `state`: Shared application state.
///
/// # Returns
/// Configured `axum::Router`.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/gists", post(handlers::gist::create_gist))
        .route(
            "/gists/:id",
            get(handlers::gist::get_gist).post(handlers::gist::append_to_gist),
        )
        .route("/accounts", post(handlers::account::create_account))
        .route("/accounts/:id", get(handlers::account::get_account))
        .route("/accounts/:id/id", post(handlers::account::reset_account_id))
        .route(
            "/accounts/:id/marks/:gist",
            post(handlers::account::mark_gist),
        )
        .with_state(state.clone())
        .layer(
            tower::ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(state.config.max_body_size))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(middleware::from_fn_with_state(
                    state,
                    ratelimit::enforce_rate_limit,
                )),
        )
}

/// Resolve the listener address.
///
/// # Arguments
/// - `config`: Server configuration containing the configured `port`.
/// - `requested`: Raw `BIND` override, if set.
///
/// # Returns
/// The override when it parses as a socket address, otherwise all interfaces
/// on the configured port.
pub fn resolve_bind_address(config: &Config, requested: Option<&str>) -> SocketAddr {
    let default_bind = SocketAddr::from(([0, 0, 0, 0], config.port));
    let Some(value) = requested.map(str::trim).filter(|v| !v.is_empty()) else {
        return default_bind;
    };
    match value.parse::<SocketAddr>() {
        Ok(addr) => addr,
        Err(err) => {
            tracing::warn!(
                "Invalid BIND='{}': {}. Falling back to {}",
                value,
                err,
                default_bind
            );
            default_bind
        }
    }
}

/// Run the Axum server with graceful shutdown support.
///
/// Peer addresses are exposed to handlers so the rate limiter can fall back
/// to them when no forwarding header names the client.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let app = create_app(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
}
