//! Error taxonomy for the Google login flow.
//!
//! Every stage returns `Result<_, AuthError>`. The HTTP layer only ever exposes
//! `{reference, code, message}`; the full error is logged server-side.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type AuthResult<T> = Result<T, AuthError>;

/// Component that reported a failure, surfaced as `reference`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Component {
    Encryptor,
    StateTokenIssuer,
    StateTokenValidator,
    TokenExchanger,
    SessionIssuer,
    GoogleLogin,
    AuthUrlGenerator,
}

impl Component {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encryptor => "Encryptor",
            Self::StateTokenIssuer => "StateTokenIssuer",
            Self::StateTokenValidator => "StateTokenValidator",
            Self::TokenExchanger => "TokenExchanger",
            Self::SessionIssuer => "SessionIssuer",
            Self::GoogleLogin => "GoogleLogin",
            Self::AuthUrlGenerator => "AuthUrlGenerator",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unexpected error: {0}")]
    Unexpected(String),
    #[error("missing required parameters: {0}")]
    EmptyParams(String),
    #[error("state store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("provider is invalid: {0}")]
    InvalidProvider(String),
    #[error("request is invalid: {0}")]
    InvalidRequestType(String),
    #[error("invalid encrypted payload")]
    InvalidPayload,
    #[error("invalid state token")]
    InvalidStateToken,
    #[error("unknown, expired or already used state key")]
    InvalidKey,
    #[error("stored state record is malformed: {0}")]
    MalformedRecord(String),
    #[error("request fingerprint does not match")]
    FingerprintMismatch,
    #[error("invalid component: {0}")]
    InvalidComponent(String),
    #[error("failed to exchange code: {0}")]
    ExternalApi(String),
    #[error("failed to parse JSON: {0}")]
    JsonParse(String),
    #[error("failed to decode id token: {0}")]
    TokenDecode(String),
    #[error("failed to process identity: {0}")]
    Processing(String),
}

impl AuthError {
    /// Stable error code returned to clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unexpected(_) => "G-500",
            Self::EmptyParams(_) => "G-1000",
            Self::StoreUnavailable(_) => "G-1001",
            Self::InvalidProvider(_) => "A-1000",
            Self::InvalidRequestType(_) => "A-1001",
            Self::InvalidPayload => "A-1002",
            Self::InvalidStateToken => "A-1003",
            Self::InvalidKey => "A-1004",
            Self::MalformedRecord(_) => "A-1005",
            Self::FingerprintMismatch => "A-1006",
            Self::InvalidComponent(_) => "A-1007",
            Self::ExternalApi(_) => "A-1008",
            Self::JsonParse(_) => "A-1009",
            Self::TokenDecode(_) => "A-1010",
            Self::Processing(_) => "A-1011",
        }
    }

    /// Client-facing message. Infrastructure details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Unexpected(_) => "Unexpected error".to_string(),
            Self::StoreUnavailable(_) => "State store unavailable".to_string(),
            Self::ExternalApi(_) => "Failed to exchange code".to_string(),
            Self::Processing(_) => "Failed to process identity".to_string(),
            other => other.to_string(),
        }
    }

    /// `false` for failures caused by our own infrastructure or the provider.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Unexpected(_) | Self::StoreUnavailable(_) | Self::ExternalApi(_) | Self::Processing(_)
        )
    }

    /// Tamper, replay or theft indicators worth alerting on.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::InvalidPayload
                | Self::InvalidStateToken
                | Self::InvalidKey
                | Self::FingerprintMismatch
        )
    }

    #[must_use]
    pub fn details(&self, reference: Component) -> ErrorDetails {
        ErrorDetails {
            reference: reference.as_str().to_string(),
            code: self.code().to_string(),
            message: self.public_message(),
        }
    }
}

/// A failure together with the component that reported it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}: {error}", reference.as_str())]
pub struct StageError {
    pub reference: Component,
    pub error: AuthError,
}

impl StageError {
    #[must_use]
    pub const fn new(reference: Component, error: AuthError) -> Self {
        Self { reference, error }
    }

    #[must_use]
    pub fn details(&self) -> ErrorDetails {
        self.error.details(self.reference)
    }
}

#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetails {
    pub reference: String,
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let errors = [
            AuthError::Unexpected(String::new()),
            AuthError::EmptyParams(String::new()),
            AuthError::StoreUnavailable(String::new()),
            AuthError::InvalidProvider(String::new()),
            AuthError::InvalidRequestType(String::new()),
            AuthError::InvalidPayload,
            AuthError::InvalidStateToken,
            AuthError::InvalidKey,
            AuthError::MalformedRecord(String::new()),
            AuthError::FingerprintMismatch,
            AuthError::InvalidComponent(String::new()),
            AuthError::ExternalApi(String::new()),
            AuthError::JsonParse(String::new()),
            AuthError::TokenDecode(String::new()),
            AuthError::Processing(String::new()),
        ];
        let mut codes: Vec<&str> = errors.iter().map(AuthError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let err = AuthError::StoreUnavailable("connection refused (os error 111)".to_string());
        assert!(!err.is_client_error());
        let details = err.details(Component::StateTokenIssuer);
        assert_eq!(details.reference, "StateTokenIssuer");
        assert_eq!(details.code, "G-1001");
        assert!(!details.message.contains("os error"));
    }

    #[test]
    fn tamper_and_replay_are_flagged() {
        assert!(AuthError::FingerprintMismatch.is_suspicious());
        assert!(AuthError::InvalidKey.is_suspicious());
        assert!(AuthError::InvalidPayload.is_client_error());
        assert!(!AuthError::EmptyParams("state".to_string()).is_suspicious());
    }

    #[test]
    fn stage_error_display_names_component() {
        let err = StageError::new(Component::TokenExchanger, AuthError::InvalidKey);
        assert!(err.to_string().starts_with("TokenExchanger: "));
        assert_eq!(err.details().code, "A-1004");
    }
}
