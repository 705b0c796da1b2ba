//! HTTP control endpoint for a [`Registry`].
//!
//! | Method | Registry verb | Request                      | Response                         |
//! |--------|---------------|------------------------------|----------------------------------|
//! | GET    | query         | -                            | 200, addresses in the header     |
//! | POST   | announce      | address in the header        | 200, or 400 `missing address`    |
//! | other  | -             | -                            | 405                              |
//!
//! Both directions use the [`SERVERS_HEADER`] metadata field; the address
//! list is comma-joined.

use std::future::Future;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;

use crate::error::RegistryError;
use crate::registry::{ControlRequest, ControlResponse, Registry};

/// Metadata header carrying addresses in both directions.
pub const SERVERS_HEADER: &str = "x-beacon-servers";

/// Build a router serving the control endpoint at the registry's path.
pub fn router(registry: Arc<Registry>) -> Router {
    let path = registry.config().path.clone();
    Router::new()
        .route(&path, any(control))
        .with_state(registry)
}

/// Serve the control endpoint until the listener fails.
pub async fn serve(listener: TcpListener, registry: Arc<Registry>) -> std::io::Result<()> {
    serve_with_shutdown(listener, registry, std::future::pending()).await
}

/// Serve the control endpoint until `signal` resolves.
///
/// Starts the registry's sweeper for the lifetime of the server when one is
/// configured.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    registry: Arc<Registry>,
    signal: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweeper = match registry.config().sweep_interval {
        Some(interval) => Some(
            registry
                .spawn_sweeper(interval)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?,
        ),
        None => None,
    };

    tracing::info!(
        addr = ?listener.local_addr().ok(),
        path = %registry.config().path,
        ttl = ?registry.ttl(),
        "rpc registry listening"
    );

    let result = axum::serve(listener, router(registry))
        .with_graceful_shutdown(signal)
        .await;

    if let Some(sweeper) = sweeper {
        sweeper.stop().await;
    }
    result
}

async fn control(
    State(registry): State<Arc<Registry>>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    let address = headers
        .get(SERVERS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    match registry.handle(ControlRequest::from_method(method.as_str(), address)) {
        Ok(ControlResponse::Servers(servers)) => {
            let joined = servers.join(",");
            match HeaderValue::from_str(&joined) {
                Ok(value) => {
                    let mut headers = HeaderMap::new();
                    headers.insert(SERVERS_HEADER, value);
                    (StatusCode::OK, headers).into_response()
                }
                Err(e) => {
                    tracing::error!(error = %e, "server list is not a valid header value");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Ok(ControlResponse::Announced) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::debug!(method = %method, error = %e, "rejected registry request");
            (status_for(&e), e.to_string()).into_response()
        }
    }
}

fn status_for(error: &RegistryError) -> StatusCode {
    match error {
        RegistryError::MissingAddress | RegistryError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        RegistryError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
