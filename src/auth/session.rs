//! Session issuance for a verified identity.
//!
//! Credentials follow the token-auth header scheme: `access-token`,
//! `token-type`, `client`, `expiry`, `uid` plus a combined `authorization`
//! header carrying all five as base64 JSON.

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{error, info, instrument};

use super::{
    error::{AuthError, AuthResult},
    google::IdentityClaims,
    provider::Provider,
    users::{hash_secret, NewToken, NewUser, TokenEntry, UserStore},
};

const DEFAULT_TOKEN_LIFESPAN: Duration = Duration::from_secs(14 * 24 * 60 * 60);
const DEFAULT_MAX_CLIENTS: usize = 10;
const PLACEHOLDER_PASSWORD_LENGTH: usize = 20;
const TOKEN_TYPE: &str = "Bearer";

#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    token_lifespan: Duration,
    max_clients: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            token_lifespan: DEFAULT_TOKEN_LIFESPAN,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }

    #[must_use]
    pub const fn with_token_lifespan_seconds(mut self, seconds: u64) -> Self {
        self.token_lifespan = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub const fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    #[must_use]
    pub const fn token_lifespan(&self) -> Duration {
        self.token_lifespan
    }

    #[must_use]
    pub const fn max_clients(&self) -> usize {
        self.max_clients
    }
}

/// Credentials returned to the client once; the raw access token is never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub client_id: String,
    pub access_token: String,
    pub token_type: String,
    pub expiry: i64,
    pub uid: String,
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("client_id", &self.client_id)
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("uid", &self.uid)
            .finish()
    }
}

#[derive(Serialize)]
struct AuthHeader<'a> {
    #[serde(rename = "access-token")]
    access_token: &'a str,
    #[serde(rename = "token-type")]
    token_type: &'a str,
    client: &'a str,
    expiry: String,
    uid: &'a str,
}

impl SessionCredential {
    /// `Bearer <base64(JSON of the five credential fields)>`
    ///
    /// # Errors
    /// Returns `Unexpected` if the header cannot be serialized.
    pub fn authorization(&self) -> AuthResult<String> {
        let header = AuthHeader {
            access_token: &self.access_token,
            token_type: &self.token_type,
            client: &self.client_id,
            expiry: self.expiry.to_string(),
            uid: &self.uid,
        };
        let json = serde_json::to_vec(&header)
            .map_err(|e| AuthError::Unexpected(format!("failed to serialize auth header: {e}")))?;
        Ok(format!("{TOKEN_TYPE} {}", Base64::encode_string(&json)))
    }

    /// Response headers in emission order.
    ///
    /// # Errors
    /// Returns `Unexpected` if the authorization header cannot be built.
    pub fn headers(&self) -> AuthResult<Vec<(&'static str, String)>> {
        Ok(vec![
            ("access-token", self.access_token.clone()),
            ("token-type", self.token_type.clone()),
            ("client", self.client_id.clone()),
            ("expiry", self.expiry.to_string()),
            ("uid", self.uid.clone()),
            ("authorization", self.authorization()?),
        ])
    }
}

/// Maps identity claims to an application user and mints a session token.
#[derive(Clone)]
pub struct SessionIssuer {
    users: Arc<dyn UserStore>,
    config: SessionConfig,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, config: SessionConfig) -> Self {
        Self { users, config }
    }

    /// Find or create the user for `claims` and attach a fresh session token.
    ///
    /// # Errors
    /// `EmptyParams` without an email claim; `Processing` when the user
    /// cannot be persisted; `Unexpected` on RNG or clock failure.
    #[instrument(skip_all)]
    pub async fn issue(&self, claims: &IdentityClaims) -> AuthResult<SessionCredential> {
        let email = claims
            .email()
            .ok_or_else(|| AuthError::EmptyParams("email claim".to_string()))?;

        let now = unix_now()?;
        let lifespan = i64::try_from(self.config.token_lifespan().as_secs())
            .map_err(|e| AuthError::Unexpected(format!("token lifespan out of range: {e}")))?;
        let expiry = now.saturating_add(lifespan);

        let client_id = random_token()?;
        let access_token = random_token()?;

        let token_hash = hash_secret(&access_token)
            .map_err(|e| AuthError::Processing(format!("{e:#}")))?;
        let password_hash = hash_secret(&random_password()?)
            .map_err(|e| AuthError::Processing(format!("{e:#}")))?;

        let new_user = NewUser {
            email: email.to_string(),
            uid: email.to_string(),
            provider: Provider::Google.user_marker().to_string(),
            password_hash,
        };
        let token = NewToken {
            client_id: client_id.clone(),
            entry: TokenEntry {
                token: token_hash,
                expiry,
            },
            max_clients: self.config.max_clients(),
            now,
        };

        let session = self
            .users
            .find_or_create_with_token(&new_user, &token)
            .await
            .map_err(|e| {
                error!("Failed to persist user session: {e:#}");
                AuthError::Processing("failed to persist user".to_string())
            })?;

        info!(
            user_id = %session.user.id,
            created = session.created,
            "session issued"
        );

        Ok(SessionCredential {
            client_id,
            access_token,
            token_type: TOKEN_TYPE.to_string(),
            expiry,
            uid: session.user.uid,
        })
    }
}

fn unix_now() -> AuthResult<i64> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AuthError::Unexpected(format!("system clock before epoch: {e}")))?
        .as_secs();
    i64::try_from(secs).map_err(|e| AuthError::Unexpected(format!("clock out of range: {e}")))
}

/// URL-safe base64 of 16 random bytes.
fn random_token() -> AuthResult<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Unexpected(format!("failed to generate token: {e}")))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

fn random_password() -> AuthResult<String> {
    let mut bytes = [0u8; PLACEHOLDER_PASSWORD_LENGTH];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Unexpected(format!("failed to generate password: {e}")))?;
    let mut password = Base64UrlUnpadded::encode_string(&bytes);
    password.truncate(PLACEHOLDER_PASSWORD_LENGTH);
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::MemoryUserStore;
    use serde_json::{json, Value};

    fn claims(value: Value) -> IdentityClaims {
        IdentityClaims::from_value(value).unwrap()
    }

    fn issuer(users: Arc<MemoryUserStore>) -> SessionIssuer {
        SessionIssuer::new(users, SessionConfig::new().with_token_lifespan_seconds(3600))
    }

    #[tokio::test]
    async fn first_login_creates_exactly_one_user() -> AuthResult<()> {
        let users = Arc::new(MemoryUserStore::new());
        let credential = issuer(users.clone())
            .issue(&claims(json!({"email": "alice@example.com", "name": "Alice"})))
            .await?;

        assert_eq!(users.count().await, 1);
        let user = users.find_by_email("alice@example.com").await.unwrap();
        assert_eq!(user.uid, "alice@example.com");
        assert_eq!(user.provider, "google");
        assert!(user.confirmed);

        let entry = user.tokens.get(&credential.client_id).unwrap();
        assert_ne!(entry.token, credential.access_token);
        assert!(entry.verify(&credential.access_token));
        assert_eq!(entry.expiry, credential.expiry);

        let now = unix_now()?;
        assert!((credential.expiry - (now + 3600)).abs() <= 5);
        Ok(())
    }

    #[tokio::test]
    async fn returning_user_is_reused() -> AuthResult<()> {
        let users = Arc::new(MemoryUserStore::new());
        let issuer = issuer(users.clone());
        let identity = claims(json!({"Email": "bob@example.com"}));

        let first = issuer.issue(&identity).await?;
        let second = issuer.issue(&identity).await?;

        assert_eq!(users.count().await, 1);
        assert_ne!(first.client_id, second.client_id);
        let user = users.find_by_email("bob@example.com").await.unwrap();
        assert_eq!(user.tokens.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_email_is_empty_params() {
        let users = Arc::new(MemoryUserStore::new());
        let result = issuer(users.clone())
            .issue(&claims(json!({"name": "Nobody", "email": "  "})))
            .await;
        assert!(matches!(result, Err(AuthError::EmptyParams(_))));
        assert_eq!(users.count().await, 0);
    }

    #[tokio::test]
    async fn failed_save_persists_nothing() {
        let users = Arc::new(MemoryUserStore::new());
        users.fail_saves(true);
        let result = issuer(users.clone())
            .issue(&claims(json!({"email": "carol@example.com"})))
            .await;
        assert!(matches!(result, Err(AuthError::Processing(_))));
        assert_eq!(users.count().await, 0);
    }

    #[test]
    fn authorization_header_encodes_all_fields() -> AuthResult<()> {
        let credential = SessionCredential {
            client_id: "client".to_string(),
            access_token: "raw-secret".to_string(),
            token_type: "Bearer".to_string(),
            expiry: 1_700_000_000,
            uid: "alice@example.com".to_string(),
        };
        let authorization = credential.authorization()?;
        let encoded = authorization.strip_prefix("Bearer ").unwrap();
        let decoded: Value = serde_json::from_slice(&Base64::decode_vec(encoded).unwrap()).unwrap();
        assert_eq!(
            decoded,
            json!({
                "access-token": "raw-secret",
                "token-type": "Bearer",
                "client": "client",
                "expiry": "1700000000",
                "uid": "alice@example.com"
            })
        );

        let headers = credential.headers()?;
        let names: Vec<&str> = headers.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            ["access-token", "token-type", "client", "expiry", "uid", "authorization"]
        );
        assert!(!format!("{credential:?}").contains("raw-secret"));
        Ok(())
    }

    #[test]
    fn random_tokens_are_url_safe() -> AuthResult<()> {
        let token = random_token()?;
        assert_eq!(token.len(), 22);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(random_password()?.len(), PLACEHOLDER_PASSWORD_LENGTH);
        Ok(())
    }
}
