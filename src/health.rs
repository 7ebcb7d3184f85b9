//! Liveness endpoint for the hosting platform.

use std::net::{Ipv4Addr, SocketAddr};

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{AppError, Result};

/// Routes: `GET /` and `GET /health`.
#[must_use]
pub fn router() -> Router {
    Router::new()
        .route("/", get(|| async { "Bug intake bot is running!" }))
        .route("/health", get(|| async { "ok" }))
}

/// Bind `0.0.0.0:port` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the port cannot be bound or the server fails.
pub async fn serve_health(port: u16, ct: CancellationToken) -> Result<()> {
    let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Io(format!("failed to bind health endpoint on {bind}: {err}")))?;
    serve_on(listener, ct).await
}

/// Serve the health routes on an already bound listener.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve_on(listener: TcpListener, ct: CancellationToken) -> Result<()> {
    let addr = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("health listener has no address: {err}")))?;
    info!(%addr, "health endpoint listening");

    axum::serve(listener, router())
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("health server error: {err}")))?;

    info!("health endpoint shut down");
    Ok(())
}
