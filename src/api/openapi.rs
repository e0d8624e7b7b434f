#![allow(clippy::needless_for_each)]

use axum::response::{IntoResponse, Json};
use utoipa::OpenApi;

use crate::{
    api::handlers::{google, health},
    auth::ErrorDetails,
};

#[derive(OpenApi)]
#[openapi(
    paths(health::health, google::begin, google::callback),
    components(
        schemas(health::Health, google::AuthUrl, google::LoginOk, google::ErrorResponse, ErrorDetails)
    ),
    tags(
        (name = "auth", description = "Sign in with Google"),
        (name = "health", description = "Service status"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

pub async fn openapi_json() -> impl IntoResponse {
    Json(openapi())
}
