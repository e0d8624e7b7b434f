//! Google login orchestration.
//!
//! `ValidateParams -> ValidateStateToken -> ExchangeCode -> ProcessIdentity`.
//! Each stage short-circuits; nothing past the state token check runs unless
//! the token was valid for this request. Failures are reported to the client
//! as `GoogleLogin`; the failing stage is only logged.

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    error::{AuthError, Component, StageError},
    fingerprint::Fingerprint,
    google::CodeExchanger,
    session::{SessionCredential, SessionIssuer},
    state_token::StateTokenValidator,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ValidateParams,
    ValidateStateToken,
    ExchangeCode,
    ProcessIdentity,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidateParams => "validate_params",
            Self::ValidateStateToken => "validate_state_token",
            Self::ExchangeCode => "exchange_code",
            Self::ProcessIdentity => "process_identity",
        }
    }

    const fn component(self) -> Component {
        match self {
            Self::ValidateParams => Component::GoogleLogin,
            Self::ValidateStateToken => Component::StateTokenValidator,
            Self::ExchangeCode => Component::TokenExchanger,
            Self::ProcessIdentity => Component::SessionIssuer,
        }
    }
}

#[derive(Clone)]
pub struct GoogleLogin {
    validator: StateTokenValidator,
    exchanger: Arc<dyn CodeExchanger>,
    sessions: SessionIssuer,
}

impl GoogleLogin {
    #[must_use]
    pub fn new(
        validator: StateTokenValidator,
        exchanger: Arc<dyn CodeExchanger>,
        sessions: SessionIssuer,
    ) -> Self {
        Self {
            validator,
            exchanger,
            sessions,
        }
    }

    /// Complete a provider callback.
    ///
    /// # Errors
    /// Returns the first failing stage together with its error.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        code: &str,
        state_token: &str,
        fingerprint: Option<&Fingerprint>,
    ) -> Result<SessionCredential, StageError> {
        let fingerprint = validate_params(code, state_token, fingerprint)
            .map_err(|e| fail(Stage::ValidateParams, e))?;

        self.validator
            .validate(state_token, Some(fingerprint))
            .await
            .map_err(|e| fail(Stage::ValidateStateToken, e))?;

        let claims = self
            .exchanger
            .exchange(code)
            .await
            .map_err(|e| fail(Stage::ExchangeCode, e))?;

        let credential = self
            .sessions
            .issue(&claims)
            .await
            .map_err(|e| fail(Stage::ProcessIdentity, e))?;

        info!(uid = %credential.uid, "google login completed");

        Ok(credential)
    }
}

fn validate_params<'a>(
    code: &str,
    state_token: &str,
    fingerprint: Option<&'a Fingerprint>,
) -> Result<&'a Fingerprint, AuthError> {
    let mut missing = Vec::new();
    if code.trim().is_empty() {
        missing.push("code");
    }
    if state_token.trim().is_empty() {
        missing.push("state");
    }
    if fingerprint.is_none() {
        missing.push("request");
    }
    match fingerprint {
        Some(fingerprint) if missing.is_empty() => Ok(fingerprint),
        _ => Err(AuthError::EmptyParams(missing.join(", "))),
    }
}

fn fail(stage: Stage, error: AuthError) -> StageError {
    let failure = StageError::new(Component::GoogleLogin, error);
    if failure.error.is_client_error() {
        warn!(
            stage = stage.as_str(),
            component = stage.component().as_str(),
            code = failure.error.code(),
            suspicious = failure.error.is_suspicious(),
            "google login rejected: {failure}"
        );
    } else {
        error!(
            stage = stage.as_str(),
            component = stage.component().as_str(),
            code = failure.error.code(),
            "google login failed: {failure}"
        );
    }
    failure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{
        encryptor::Encryptor,
        error::AuthResult,
        google::{ExchangeFuture, IdentityClaims},
        session::SessionConfig,
        state_token::{StateTokenConfig, StateTokenIssuer},
        store::MemoryStore,
        users::MemoryUserStore,
    };
    use secrecy::SecretString;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubExchanger {
        result: AuthResult<IdentityClaims>,
        calls: AtomicUsize,
    }

    impl StubExchanger {
        fn new(result: AuthResult<IdentityClaims>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CodeExchanger for StubExchanger {
        fn exchange<'a>(&'a self, _code: &'a str) -> ExchangeFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.result.clone();
            Box::pin(async move { result })
        }
    }

    struct Harness {
        issuer: StateTokenIssuer,
        login: GoogleLogin,
        exchanger: Arc<StubExchanger>,
        users: Arc<MemoryUserStore>,
    }

    fn harness(result: AuthResult<IdentityClaims>) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let encryptor =
            Arc::new(Encryptor::new(&SecretString::from("test-secret".to_string())).unwrap());
        let issuer = StateTokenIssuer::new(store.clone(), encryptor.clone(), StateTokenConfig::new());
        let validator = StateTokenValidator::new(store, encryptor);
        let exchanger = StubExchanger::new(result);
        let users = Arc::new(MemoryUserStore::new());
        let sessions = SessionIssuer::new(users.clone(), SessionConfig::new());
        Harness {
            issuer,
            login: GoogleLogin::new(validator, exchanger.clone(), sessions),
            exchanger,
            users,
        }
    }

    fn alice() -> AuthResult<IdentityClaims> {
        IdentityClaims::from_value(json!({"email": "alice@example.com", "name": "Alice"}))
    }

    fn browser() -> Fingerprint {
        Fingerprint::new("Mozilla/5.0", "10.0.0.1")
    }

    #[tokio::test]
    async fn completes_login() -> AuthResult<()> {
        let h = harness(alice());
        let state = h.issuer.issue(Some(&browser()), "google").await?;

        let credential = h
            .login
            .login("4/code", &state, Some(&browser()))
            .await
            .map_err(|e| e.error)?;

        assert_eq!(credential.uid, "alice@example.com");
        assert_eq!(credential.token_type, "Bearer");
        assert_eq!(h.exchanger.calls(), 1);
        assert_eq!(h.users.count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_state_never_reaches_exchange() {
        let h = harness(alice());
        let err = h
            .login
            .login("4/code", "not-a-state-token", Some(&browser()))
            .await
            .unwrap_err();

        assert_eq!(err.reference, Component::GoogleLogin);
        assert_eq!(err.details().reference, "GoogleLogin");
        assert_eq!(err.error, AuthError::InvalidPayload);
        assert_eq!(h.exchanger.calls(), 0);
        assert_eq!(h.users.count().await, 0);
    }

    #[tokio::test]
    async fn replayed_state_is_rejected() -> AuthResult<()> {
        let h = harness(alice());
        let state = h.issuer.issue(Some(&browser()), "google").await?;

        assert!(h.login.login("4/code", &state, Some(&browser())).await.is_ok());
        let err = h
            .login
            .login("4/code", &state, Some(&browser()))
            .await
            .unwrap_err();

        assert_eq!(err.error, AuthError::InvalidKey);
        assert_eq!(h.exchanger.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_browser_is_rejected() -> AuthResult<()> {
        let h = harness(alice());
        let state = h.issuer.issue(Some(&browser()), "google").await?;

        let err = h
            .login
            .login("4/code", &state, Some(&Fingerprint::new("curl/8.0", "10.0.0.1")))
            .await
            .unwrap_err();

        assert_eq!(err.error, AuthError::FingerprintMismatch);
        assert_eq!(h.exchanger.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn exchange_failure_creates_nothing() -> AuthResult<()> {
        let h = harness(Err(AuthError::ExternalApi(
            "400 Bad Request: {\"error\":\"invalid_grant\"}".to_string(),
        )));
        let state = h.issuer.issue(Some(&browser()), "google").await?;

        let err = h
            .login
            .login("4/code", &state, Some(&browser()))
            .await
            .unwrap_err();

        assert_eq!(err.reference, Component::GoogleLogin);
        assert!(matches!(err.error, AuthError::ExternalApi(_)));
        assert_eq!(err.details().message, "Failed to exchange code");
        assert_eq!(h.users.count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_params_fail_first() {
        let h = harness(alice());
        let err = h.login.login("", "", None).await.unwrap_err();

        assert_eq!(err.reference, Component::GoogleLogin);
        assert_eq!(
            err.error,
            AuthError::EmptyParams("code, state, request".to_string())
        );
        assert_eq!(h.exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn claims_without_email_fail_processing() -> AuthResult<()> {
        let h = harness(IdentityClaims::from_value(json!({"name": "Anon"})));
        let state = h.issuer.issue(Some(&browser()), "google").await?;

        let err = h
            .login
            .login("4/code", &state, Some(&browser()))
            .await
            .unwrap_err();

        assert_eq!(err.reference, Component::GoogleLogin);
        assert!(matches!(err.error, AuthError::EmptyParams(_)));
        assert_eq!(h.users.count().await, 0);
        Ok(())
    }
}
