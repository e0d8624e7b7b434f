use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::get,
    Extension, Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::auth::{AuthUrlGenerator, GoogleLogin, TrustedProxies};

pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Login services shared by the handlers.
#[derive(Clone)]
pub struct Services {
    pub auth_url: AuthUrlGenerator,
    pub login: GoogleLogin,
    pub trusted_proxies: TrustedProxies,
}

impl Services {
    #[must_use]
    pub fn new(auth_url: AuthUrlGenerator, login: GoogleLogin) -> Self {
        Self {
            auth_url,
            login,
            trusted_proxies: TrustedProxies::default(),
        }
    }

    /// Proxies whose `x-forwarded-for` / `x-real-ip` headers are believed.
    #[must_use]
    pub fn with_trusted_proxies(mut self, trusted_proxies: TrustedProxies) -> Self {
        self.trusted_proxies = trusted_proxies;
        self
    }
}

/// Build the application router.
///
/// Handlers read the peer address through `ConnectInfo`, so serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
#[must_use]
pub fn router(services: Services) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/openapi.json", get(openapi::openapi_json))
        .route("/v1/auth/google", get(handlers::google::begin))
        .route("/v1/auth/google/callback", get(handlers::google::callback))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(services)),
        )
}

/// Serve the API until interrupted.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails
pub async fn new(port: u16, services: Services) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        router(services).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let method = request.method().as_str();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    info_span!("http.request", method, path, request_id)
}
