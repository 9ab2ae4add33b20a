use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::routing::get;
use axum::{Extension, Router};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tower_http::trace::{DefaultOnFailure, DefaultOnResponse};
use tower_http::LatencyUnit;
use uuid::Uuid;

mod config;
mod handlers;
mod health;

pub use config::Config;
pub use handlers::secret::SecretRequestError;

use crate::ServiceState;

const STATUS_PREFIX: &str = "/_status";

/// Maximum request body size in bytes (64 KiB)
pub const MAX_REQUEST_SIZE_BYTES: usize = 64 * 1024;

/// Build the secrets server router.
///
/// `/` answers GET (public key), POST (secret request) and OPTIONS; any
/// other method is a 405. Health checks live under `/_status`.
pub fn router(config: Config, state: ServiceState) -> Router {
    let log_level = config.log_level;
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                id = %Uuid::new_v4(),
                method = %request.method(),
                path = %request.uri().path(),
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .include_headers(false)
                .level(log_level)
                .latency_unit(LatencyUnit::Micros),
        )
        .on_failure(DefaultOnFailure::new().latency_unit(LatencyUnit::Micros));

    Router::new()
        .route(
            "/",
            get(handlers::public_key::handler)
                .post(handlers::secret::handler)
                .options(handlers::options_handler)
                .fallback(handlers::method_not_allowed_handler),
        )
        .nest(STATUS_PREFIX, health::router())
        .fallback(handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_SIZE_BYTES))
        .layer(Extension(config))
        .with_state(state)
        .layer(trace_layer)
}

/// Bind the configured address and serve until `shutdown_rx` fires.
pub async fn run(
    config: Config,
    state: ServiceState,
    shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    serve(listener, config, state, shutdown_rx).await
}

/// Serve on an already bound listener.
///
/// Connection info is attached to every request; the secret handler needs the
/// peer address for its network check.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    state: ServiceState,
    mut shutdown_rx: watch::Receiver<()>,
) -> Result<(), HttpServerError> {
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = ?local_addr, allow_cidr = %config.allow_cidr, "secrets server listening");

    let app = router(config, state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await?;

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("an error occurred running the HTTP server: {0}")]
    ServingFailed(#[from] std::io::Error),
}
