use secrecy::SecretString;
use std::time::Duration;

const DEFAULT_AUTH_BASE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_EXCHANGE_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_SCOPE: &str = "email profile";

/// Google OAuth2 client settings.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    client_id: String,
    client_secret: SecretString,
    redirect_url: String,
    auth_base_url: String,
    token_exchange_url: String,
    scope: String,
    http_timeout: Duration,
}

impl GoogleConfig {
    #[must_use]
    pub fn new(client_id: String, client_secret: SecretString, redirect_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            token_exchange_url: DEFAULT_TOKEN_EXCHANGE_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_auth_base_url(mut self, url: String) -> Self {
        self.auth_base_url = url;
        self
    }

    #[must_use]
    pub fn with_token_exchange_url(mut self, url: String) -> Self {
        self.token_exchange_url = url;
        self
    }

    #[must_use]
    pub fn with_scope(mut self, scope: String) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn with_http_timeout_seconds(mut self, seconds: u64) -> Self {
        self.http_timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    #[must_use]
    pub fn auth_base_url(&self) -> &str {
        &self.auth_base_url
    }

    #[must_use]
    pub fn token_exchange_url(&self) -> &str {
        &self.token_exchange_url
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }
}
