//! Application users as seen by the login flow.
//!
//! The flow only needs one operation: find the user by email (creating it if
//! absent), add a session token entry and persist, all as one unit of work.

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, future::Future, pin::Pin};
use uuid::Uuid;

pub type UserFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Token map entry: only the salted hash of the access token is kept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub expiry: i64,
}

impl TokenEntry {
    /// Check a raw access token against the stored hash.
    #[must_use]
    pub fn verify(&self, raw_token: &str) -> bool {
        PasswordHash::new(&self.token).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(raw_token.as_bytes(), &hash)
                .is_ok()
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub uid: String,
    pub provider: String,
    pub confirmed: bool,
    pub tokens: HashMap<String, TokenEntry>,
}

/// Fields for a user created on first provider login.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub uid: String,
    pub provider: String,
    pub password_hash: String,
}

/// Token to attach to the user's token map.
#[derive(Clone, Debug)]
pub struct NewToken {
    pub client_id: String,
    pub entry: TokenEntry,
    /// Entries beyond this count are evicted, soonest expiry first.
    pub max_clients: usize,
    pub now: i64,
}

/// Outcome of [`UserStore::find_or_create_with_token`].
#[derive(Clone, Debug)]
pub struct UserSession {
    pub user: User,
    pub created: bool,
}

pub trait UserStore: Send + Sync {
    /// Find the user by `new_user.email` or create it, add `token`, persist.
    ///
    /// Either everything is persisted or nothing is.
    fn find_or_create_with_token<'a>(
        &'a self,
        new_user: &'a NewUser,
        token: &'a NewToken,
    ) -> UserFuture<'a, UserSession>;
}

/// Salted Argon2 hash in PHC string format.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("failed to hash secret")?;
    Ok(hash.to_string())
}

/// Drop expired entries, insert the new one, then cap the map size.
pub(crate) fn apply_token(tokens: &mut HashMap<String, TokenEntry>, token: &NewToken) {
    tokens.retain(|_, entry| entry.expiry > token.now);
    tokens.insert(token.client_id.clone(), token.entry.clone());

    while tokens.len() > token.max_clients.max(1) {
        let oldest = tokens
            .iter()
            .filter(|(client_id, _)| **client_id != token.client_id)
            .min_by_key(|(_, entry)| entry.expiry)
            .map(|(client_id, _)| client_id.clone());
        match oldest {
            Some(client_id) => {
                tokens.remove(&client_id);
            }
            None => break,
        }
    }
}
