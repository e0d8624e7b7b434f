//! TTL-capable key-value storage for pending login attempts.
//!
//! Single-use enforcement relies on [`StateStore::take`] being atomic: two
//! concurrent callers racing on the same key must never both see the value.

use redis::{aio::MultiplexedConnection, Client, RedisResult};
use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    time::{Duration, Instant},
};
use tokio::{sync::Mutex, time::timeout};
use tracing::{debug, info, Instrument};

use super::error::{AuthError, AuthResult};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = AuthResult<T>> + Send + 'a>>;

pub trait StateStore: Send + Sync {
    /// `SET key value EX ttl`.
    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()>;

    /// Atomically fetch and remove `key`.
    fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;
}

/// Redis backed store using `SET EX` and `GETDEL`.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    timeout: Duration,
}

impl RedisStore {
    /// Connect and verify the server answers `PING`.
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str, op_timeout: Duration) -> AuthResult<Self> {
        let client = Client::open(url).map_err(unavailable)?;
        let conn = timeout(op_timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| AuthError::StoreUnavailable("connect timed out".to_string()))?
            .map_err(unavailable)?;

        let store = Self {
            conn,
            timeout: op_timeout,
        };
        store.ping().await?;

        info!("Redis connection established");

        Ok(store)
    }

    async fn ping(&self) -> AuthResult<()> {
        let mut conn = self.conn.clone();
        let reply: RedisResult<String> = timeout(
            self.timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| AuthError::StoreUnavailable("PING timed out".to_string()))?;
        reply.map(|_| ()).map_err(unavailable)
    }
}

fn unavailable(err: redis::RedisError) -> AuthError {
    AuthError::StoreUnavailable(err.to_string())
}

fn store_span(operation: &'static str) -> tracing::Span {
    tracing::info_span!("kv.query", db.system = "redis", db.operation = operation)
}

impl StateStore for RedisStore {
    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(
            async move {
                let mut conn = self.conn.clone();
                // Redis rejects EX 0; anything shorter than a second rounds up.
                let seconds = ttl.as_secs().max(1);
                let reply: RedisResult<()> = timeout(
                    self.timeout,
                    redis::cmd("SET")
                        .arg(key)
                        .arg(value)
                        .arg("EX")
                        .arg(seconds)
                        .query_async(&mut conn),
                )
                .await
                .map_err(|_| AuthError::StoreUnavailable("SET timed out".to_string()))?;
                reply.map_err(unavailable)
            }
            .instrument(store_span("SET")),
        )
    }

    fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(
            async move {
                let mut conn = self.conn.clone();
                let reply: RedisResult<Option<String>> = timeout(
                    self.timeout,
                    redis::cmd("GETDEL").arg(key).query_async(&mut conn),
                )
                .await
                .map_err(|_| AuthError::StoreUnavailable("GETDEL timed out".to_string()))?;
                reply.map_err(unavailable)
            }
            .instrument(store_span("GETDEL")),
        )
    }
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store for tests and single-node development.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.lock().await;
        let now = Instant::now();
        entries.values().filter(|entry| entry.expires_at > now).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl StateStore for MemoryStore {
    fn set_ex<'a>(&'a self, key: &'a str, value: &'a str, ttl: Duration) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let now = Instant::now();
            let expires_at = now
                .checked_add(ttl)
                .ok_or_else(|| AuthError::StoreUnavailable(format!("ttl out of range: {ttl:?}")))?;
            entries.retain(|_, entry| entry.expires_at > now);
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                },
            );
            Ok(())
        })
    }

    fn take<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            match entries.remove(key) {
                Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value)),
                Some(_) => {
                    debug!("state entry expired before use");
                    Ok(None)
                }
                None => Ok(None),
            }
        })
    }
}
