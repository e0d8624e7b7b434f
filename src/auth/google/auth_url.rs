//! Builds the Google authorization URL for the "begin login" step.

use tracing::instrument;
use url::Url;

use super::config::GoogleConfig;
use crate::auth::{
    error::{AuthError, AuthResult},
    fingerprint::Fingerprint,
    provider::Provider,
    state_token::StateTokenIssuer,
};

#[derive(Clone)]
pub struct AuthUrlGenerator {
    issuer: StateTokenIssuer,
    config: GoogleConfig,
}

impl AuthUrlGenerator {
    #[must_use]
    pub fn new(issuer: StateTokenIssuer, config: GoogleConfig) -> Self {
        Self { issuer, config }
    }

    /// Issue a state token for `fingerprint` and embed it in the authorization URL.
    ///
    /// # Errors
    /// Any issuer error, or `Unexpected` if the configured base URL is invalid.
    #[instrument(skip_all)]
    pub async fn generate(&self, fingerprint: Option<&Fingerprint>) -> AuthResult<String> {
        let state_token = self
            .issuer
            .issue(fingerprint, Provider::Google.as_str())
            .await?;
        build_url(&self.config, &state_token)
    }
}

fn build_url(config: &GoogleConfig, state_token: &str) -> AuthResult<String> {
    let mut url = Url::parse(config.auth_base_url())
        .map_err(|e| AuthError::Unexpected(format!("invalid authorization base URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("state", state_token)
        .append_pair("client_id", config.client_id())
        .append_pair("redirect_uri", config.redirect_url())
        .append_pair("response_type", "code")
        .append_pair("scope", config.scope());
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        encryptor::Encryptor,
        state_token::{StateTokenConfig, StateTokenValidator},
        store::MemoryStore,
    };
    use secrecy::SecretString;
    use std::{collections::HashMap, sync::Arc};

    fn config() -> GoogleConfig {
        GoogleConfig::new(
            "client-123".to_string(),
            SecretString::from("secret".to_string()),
            "https://app.test/auth/google/callback".to_string(),
        )
    }

    #[test]
    fn url_carries_all_parameters() -> AuthResult<()> {
        let url = build_url(&config(), "tok_en-1")?;
        let parsed = Url::parse(&url).map_err(|e| AuthError::Unexpected(e.to_string()))?;
        let pairs: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert_eq!(pairs.get("state").map(String::as_str), Some("tok_en-1"));
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-123"));
        assert_eq!(
            pairs.get("redirect_uri").map(String::as_str),
            Some("https://app.test/auth/google/callback")
        );
        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(pairs.get("scope").map(String::as_str), Some("email profile"));
        Ok(())
    }

    #[test]
    fn invalid_base_url_is_unexpected() {
        let config = config().with_auth_base_url("not a url".to_string());
        assert!(matches!(
            build_url(&config, "state"),
            Err(AuthError::Unexpected(_))
        ));
    }

    #[tokio::test]
    async fn generated_state_validates() -> AuthResult<()> {
        let store = Arc::new(MemoryStore::new());
        let encryptor = Arc::new(Encryptor::new(&SecretString::from("secret".to_string()))?);
        let issuer = StateTokenIssuer::new(store.clone(), encryptor.clone(), StateTokenConfig::new());
        let generator = AuthUrlGenerator::new(issuer, config());
        let fingerprint = Fingerprint::new("Mozilla/5.0", "10.0.0.1");

        let url = generator.generate(Some(&fingerprint)).await?;
        let parsed = Url::parse(&url).map_err(|e| AuthError::Unexpected(e.to_string()))?;
        let state = parsed
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_default();

        let validator = StateTokenValidator::new(store, encryptor);
        validator.validate(&state, Some(&fingerprint)).await
    }
}
