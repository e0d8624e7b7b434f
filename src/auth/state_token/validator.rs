use std::sync::Arc;
use tracing::{debug, instrument};

use crate::auth::{
    encryptor::Encryptor,
    error::{AuthError, AuthResult},
    fingerprint::{Fingerprint, PendingAuthAttempt},
    store::StateStore,
};

/// Consumes state tokens presented on the provider callback.
#[derive(Clone)]
pub struct StateTokenValidator {
    store: Arc<dyn StateStore>,
    encryptor: Arc<Encryptor>,
}

impl StateTokenValidator {
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, encryptor: Arc<Encryptor>) -> Self {
        Self { store, encryptor }
    }

    /// Validate and consume `state_token` for the callback request `fingerprint`.
    ///
    /// The record is removed before the fingerprint comparison, so a token is
    /// spent even when the comparison fails.
    ///
    /// # Errors
    /// `EmptyParams`, `InvalidPayload`, `InvalidStateToken`, `InvalidKey`,
    /// `StoreUnavailable`, `MalformedRecord` or `FingerprintMismatch`.
    #[instrument(skip_all)]
    pub async fn validate(
        &self,
        state_token: &str,
        fingerprint: Option<&Fingerprint>,
    ) -> AuthResult<()> {
        let state_token = state_token.trim();
        let fingerprint = match fingerprint {
            Some(fingerprint) if !state_token.is_empty() => fingerprint,
            _ => {
                return Err(AuthError::EmptyParams(
                    "state token and request are required".to_string(),
                ))
            }
        };

        let key = self.decrypt_key(state_token)?;

        let Some(raw) = self.store.take(&key).await? else {
            return Err(AuthError::InvalidKey);
        };

        debug!("state record consumed");

        let record: PendingAuthAttempt =
            serde_json::from_str(&raw).map_err(|e| AuthError::MalformedRecord(e.to_string()))?;

        if !record.matches(fingerprint) {
            return Err(AuthError::FingerprintMismatch);
        }

        Ok(())
    }

    fn decrypt_key(&self, state_token: &str) -> AuthResult<String> {
        let plaintext = self.encryptor.decrypt(state_token)?;
        let key = String::from_utf8(plaintext).map_err(|_| AuthError::InvalidStateToken)?;
        if key.trim().is_empty() {
            return Err(AuthError::InvalidStateToken);
        }
        Ok(key)
    }
}
