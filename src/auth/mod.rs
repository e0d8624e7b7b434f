//! Server-side "login with Google".
//!
//! [`AuthUrlGenerator`] starts an attempt by issuing a state token bound to the
//! requester's [`Fingerprint`]; [`GoogleLogin`] completes it on the provider
//! callback by consuming that token, exchanging the authorization code and
//! issuing a [`SessionCredential`].

pub mod encryptor;
pub mod error;
pub mod fingerprint;
pub mod flow;
pub mod google;
pub mod provider;
pub mod session;
pub mod state_token;
pub mod store;
pub mod users;

pub use encryptor::Encryptor;
pub use error::{AuthError, AuthResult, Component, ErrorDetails, StageError};
pub use fingerprint::{Fingerprint, PendingAuthAttempt, TrustedProxies};
pub use flow::{GoogleLogin, Stage};
pub use google::{
    AuthUrlGenerator, CodeExchanger, ExchangeFuture, GoogleConfig, GoogleTokenExchanger,
    IdentityClaims,
};
pub use provider::Provider;
pub use session::{SessionConfig, SessionCredential, SessionIssuer};
pub use state_token::{StateTokenConfig, StateTokenIssuer, StateTokenValidator};
pub use store::{MemoryStore, RedisStore, StateStore, StoreFuture};
pub use users::{MemoryUserStore, PgUserStore, UserStore};
