//! Google login endpoints.
//!
//! Failures always answer `422` with `{"error": {reference, code, message}}`;
//! the full error is only logged.

use axum::{
    extract::{ConnectInfo, Extension, Query},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::{error, instrument, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::Services,
    auth::{AuthError, Component, ErrorDetails, Fingerprint, SessionCredential, StageError},
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthUrl {
    pub url: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginOk {
    pub message: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code issued by Google.
    pub code: Option<String>,
    /// State token from the authorization URL; `state_token` is also accepted.
    #[serde(alias = "state_token")]
    pub state: Option<String>,
}

#[utoipa::path(
    get,
    path = "/v1/auth/google",
    responses (
        (status = 200, description = "Google authorization URL", body = AuthUrl),
        (status = 422, description = "State token could not be issued", body = ErrorResponse),
    ),
    tag = "auth",
)]
#[instrument(skip_all)]
pub async fn begin(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Extension(services): Extension<Services>,
) -> Response {
    let fingerprint = match Fingerprint::from_request(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        &services.trusted_proxies,
    ) {
        Ok(fingerprint) => fingerprint,
        Err(e) => return rejected(StageError::new(Component::AuthUrlGenerator, e)),
    };

    match services.auth_url.generate(Some(&fingerprint)).await {
        Ok(url) => (StatusCode::OK, Json(AuthUrl { url })).into_response(),
        Err(e) => {
            let failure = StageError::new(Component::AuthUrlGenerator, e);
            if failure.error.is_client_error() {
                warn!(code = failure.error.code(), "auth url rejected: {failure}");
            } else {
                error!(code = failure.error.code(), "auth url failed: {failure}");
            }
            rejected(failure)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/auth/google/callback",
    params(CallbackParams),
    responses (
        (status = 200, description = "Session issued; credentials are in the response headers", body = LoginOk),
        (status = 422, description = "Login failed", body = ErrorResponse),
    ),
    tag = "auth",
)]
#[instrument(skip_all)]
pub async fn callback(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    params: Option<Query<CallbackParams>>,
    Extension(services): Extension<Services>,
) -> Response {
    let params = params.map(|Query(params)| params).unwrap_or_default();

    let fingerprint = match Fingerprint::from_request(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        &services.trusted_proxies,
    ) {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            warn!(code = e.code(), "callback without usable fingerprint: {e}");
            return rejected(StageError::new(Component::GoogleLogin, e));
        }
    };

    let credential = match services
        .login
        .login(
            params.code.as_deref().unwrap_or_default(),
            params.state.as_deref().unwrap_or_default(),
            Some(&fingerprint),
        )
        .await
    {
        Ok(credential) => credential,
        Err(failure) => return rejected(failure),
    };

    match session_headers(&credential) {
        Ok(headers) => (
            StatusCode::OK,
            headers,
            Json(LoginOk {
                message: "ok".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to build session headers: {e}");
            rejected(StageError::new(Component::GoogleLogin, e))
        }
    }
}

fn session_headers(credential: &SessionCredential) -> Result<HeaderMap, AuthError> {
    let mut headers = HeaderMap::new();
    for (name, value) in credential.headers()? {
        let value = HeaderValue::from_str(&value)
            .map_err(|e| AuthError::Unexpected(format!("invalid {name} header: {e}")))?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

fn rejected(failure: StageError) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: failure.details(),
        }),
    )
        .into_response()
}
