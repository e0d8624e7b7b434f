//! # oauth-gate
//!
//! Google sign-in for a web application, finished server side.
//!
//! `GET /v1/auth/google` returns the provider authorization URL carrying a
//! state token. The token is an encrypted pointer to a short-lived record in
//! Redis holding the requester's user agent and IP address. On
//! `GET /v1/auth/google/callback` the record is fetched and deleted in one
//! step, compared to the callback request, and only then is the authorization
//! code exchanged for an ID token.
//!
//! A successful callback finds or creates the user in `PostgreSQL` and returns
//! token-auth session headers (`access-token`, `client`, `uid`, ...). Only a
//! salted hash of the access token is stored.
//!
//! The schema lives in `sql/schema.sql`.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
