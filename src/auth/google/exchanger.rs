//! Authorization code exchange against the Google token endpoint.
//!
//! The ID token is decoded without verifying its signature: it is received
//! directly from the provider's token endpoint over TLS, never from the client.

use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::{future::Future, pin::Pin};
use tracing::{debug, instrument};

use super::{
    claims::{decode_id_token, IdentityClaims},
    config::GoogleConfig,
};
use crate::auth::error::{AuthError, AuthResult};

pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = AuthResult<IdentityClaims>> + Send + 'a>>;

/// Turns a provider authorization code into identity claims.
pub trait CodeExchanger: Send + Sync {
    fn exchange<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a>;
}

#[derive(Clone, Debug)]
pub struct GoogleTokenExchanger {
    client: Client,
    config: GoogleConfig,
}

impl GoogleTokenExchanger {
    /// # Errors
    /// Returns `Unexpected` if the HTTP client cannot be built.
    pub fn new(config: GoogleConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| AuthError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> AuthResult<IdentityClaims> {
        let decoded_code = decode_form_component(code)?;

        let form = [
            ("code", decoded_code.as_str()),
            ("client_id", self.config.client_id()),
            ("client_secret", self.config.client_secret().expose_secret()),
            ("redirect_uri", self.config.redirect_url()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .client
            .post(self.config.token_exchange_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::ExternalApi("token endpoint timed out".to_string())
                } else {
                    AuthError::ExternalApi(format!("token endpoint unreachable: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::ExternalApi(format!("failed to read response body: {e}")))?;

        debug!(status = status.as_u16(), "token endpoint responded");

        if !status.is_success() {
            return Err(AuthError::ExternalApi(format!("{status}: {body}")));
        }

        let id_token = extract_id_token(&body)?;
        decode_id_token(&id_token)
    }
}

impl CodeExchanger for GoogleTokenExchanger {
    fn exchange<'a>(&'a self, code: &'a str) -> ExchangeFuture<'a> {
        Box::pin(self.exchange_code(code))
    }
}

fn extract_id_token(body: &str) -> AuthResult<String> {
    let value: Value = serde_json::from_str(body).map_err(|e| AuthError::JsonParse(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(AuthError::JsonParse("token response is not an object".to_string()));
    };

    map.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("id_token"))
        .and_then(|(_, value)| value.as_str())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AuthError::ExternalApi(format!("response has no id_token: {body}")))
}

/// Decode an `application/x-www-form-urlencoded` component.
///
/// `+` becomes a space and every `%` must be followed by two hex digits.
pub(crate) fn decode_form_component(input: &str) -> AuthResult<String> {
    if let Some((index, _)) = input.match_indices('%').find(|(index, _)| {
        !input
            .get(index + 1..index + 3)
            .is_some_and(|hex| hex.bytes().all(|byte| byte.is_ascii_hexdigit()))
    }) {
        return Err(AuthError::InvalidComponent(format!(
            "invalid percent-encoding at {index}"
        )));
    }

    urlencoding::decode(&input.replace('+', " "))
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| AuthError::InvalidComponent("decoded code is not UTF-8".to_string()))
}
