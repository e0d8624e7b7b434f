use rand::{rngs::OsRng, RngCore};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, instrument};

use super::{StateTokenConfig, KEY_PREFIX};
use crate::auth::{
    encryptor::Encryptor,
    error::{AuthError, AuthResult},
    fingerprint::{Fingerprint, PendingAuthAttempt},
    provider::Provider,
    store::StateStore,
};

/// Mints state tokens and persists the binding record for each attempt.
#[derive(Clone)]
pub struct StateTokenIssuer {
    store: Arc<dyn StateStore>,
    encryptor: Arc<Encryptor>,
    config: StateTokenConfig,
}

impl StateTokenIssuer {
    #[must_use]
    pub fn new(
        store: Arc<dyn StateStore>,
        encryptor: Arc<Encryptor>,
        config: StateTokenConfig,
    ) -> Self {
        Self {
            store,
            encryptor,
            config,
        }
    }

    /// Issue a state token for `provider` bound to `fingerprint`.
    ///
    /// Nothing is returned unless the binding record was persisted.
    ///
    /// # Errors
    /// `InvalidProvider`, `InvalidRequestType`, `StoreUnavailable` or `InvalidPayload`.
    #[instrument(skip(self, fingerprint))]
    pub async fn issue(&self, fingerprint: Option<&Fingerprint>, provider: &str) -> AuthResult<String> {
        let provider: Provider = provider.parse()?;
        let fingerprint = fingerprint.ok_or_else(|| {
            AuthError::InvalidRequestType("request fingerprint is required".to_string())
        })?;

        let record: PendingAuthAttempt = fingerprint.clone();
        let value = serde_json::to_string(&record)
            .map_err(|e| AuthError::Unexpected(format!("failed to serialize state record: {e}")))?;

        let key = build_store_key(provider)?;

        self.store.set_ex(&key, &value, self.config.ttl()).await?;

        debug!(ttl_seconds = self.config.ttl().as_secs(), "state record persisted");

        self.encryptor.encrypt(key.as_bytes())
    }
}

/// `STATE_TOKEN:<PROVIDER>:<unix seconds>:<16 random bytes as hex>`
pub(super) fn build_store_key(provider: Provider) -> AuthResult<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AuthError::Unexpected(format!("system clock before epoch: {e}")))?
        .as_secs();

    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Unexpected(format!("failed to generate state key: {e}")))?;

    Ok(format!("{KEY_PREFIX}:{provider}:{now}:{}", hex::encode(bytes)))
}
