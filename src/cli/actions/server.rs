use crate::{
    api::{self, Services},
    auth::{
        AuthUrlGenerator, Encryptor, GoogleConfig, GoogleLogin, GoogleTokenExchanger, PgUserStore,
        RedisStore, SessionConfig, SessionIssuer, StateTokenConfig, StateTokenIssuer,
        StateTokenValidator, TrustedProxies,
    },
    cli::telemetry,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub redis_url: String,
    pub trusted_proxies: TrustedProxies,
    pub store_timeout_ms: u64,
    pub state_token_secret: SecretString,
    pub state_token_ttl_minutes: u64,
    pub google_client_id: String,
    pub google_client_secret: SecretString,
    pub google_redirect_url: String,
    pub google_auth_base_url: String,
    pub google_token_exchange_url: String,
    pub http_timeout_seconds: u64,
    pub token_lifespan_seconds: u64,
    pub max_clients: usize,
}

/// Execute the server action.
/// # Errors
/// Returns an error if Redis or the database are unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let encryptor = Arc::new(
        Encryptor::new(&args.state_token_secret).context("Invalid state token secret")?,
    );

    let store = Arc::new(
        RedisStore::connect(&args.redis_url, Duration::from_millis(args.store_timeout_ms))
            .await
            .context("Failed to connect to Redis")?,
    );

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let google = GoogleConfig::new(
        args.google_client_id,
        args.google_client_secret,
        args.google_redirect_url,
    )
    .with_auth_base_url(args.google_auth_base_url)
    .with_token_exchange_url(args.google_token_exchange_url)
    .with_http_timeout_seconds(args.http_timeout_seconds);

    let issuer = StateTokenIssuer::new(
        store.clone(),
        encryptor.clone(),
        StateTokenConfig::new().with_ttl_minutes(args.state_token_ttl_minutes),
    );
    let validator = StateTokenValidator::new(store, encryptor);
    let exchanger = Arc::new(
        GoogleTokenExchanger::new(google.clone()).context("Failed to build token exchanger")?,
    );
    let sessions = SessionIssuer::new(
        Arc::new(PgUserStore::new(pool)),
        SessionConfig::new()
            .with_token_lifespan_seconds(args.token_lifespan_seconds)
            .with_max_clients(args.max_clients),
    );

    let services = Services::new(
        AuthUrlGenerator::new(issuer, google),
        GoogleLogin::new(validator, exchanger, sessions),
    )
    .with_trusted_proxies(args.trusted_proxies);

    let result = api::new(args.port, services).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    info!("{}", startup_message(args));
}

fn startup_message(args: &Args) -> String {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_url(&args.dsn)),
        ("redis_url", redact_url(&args.redis_url)),
        ("trusted_proxies", args.trusted_proxies.to_string()),
        ("store_timeout_ms", args.store_timeout_ms.to_string()),
        (
            "state_token_ttl_minutes",
            args.state_token_ttl_minutes.to_string(),
        ),
        ("google_client_id", args.google_client_id.clone()),
        ("google_redirect_url", args.google_redirect_url.clone()),
        (
            "google_token_exchange_url",
            args.google_token_exchange_url.clone(),
        ),
        ("http_timeout_seconds", args.http_timeout_seconds.to_string()),
        (
            "token_lifespan_seconds",
            args.token_lifespan_seconds.to_string(),
        ),
        ("max_clients", args.max_clients.to_string()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let lines: Vec<String> = entries
        .iter()
        .map(|(key, value)| {
            let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
            format!("  {key}:{padding} {value}")
        })
        .collect();

    format!(
        "{} {} ({})\n\nStartup configuration:\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH),
        lines.join("\n")
    )
}

fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-url".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_passwords() {
        assert_eq!(
            redact_url("postgres://user:hunter2@db:5432/oauth_gate"),
            "postgres://user:REDACTED@db:5432/oauth_gate"
        );
        assert_eq!(
            redact_url("redis://:hunter2@cache:6379/0"),
            "redis://:REDACTED@cache:6379/0"
        );
        assert_eq!(redact_url("redis://cache:6379"), "redis://cache:6379");
        assert_eq!(redact_url("not a url"), "invalid-url");
    }

    #[test]
    fn startup_message_is_aligned_and_redacted() {
        let args = Args {
            port: 8080,
            dsn: "postgres://gate:hunter2@db:5432/oauth_gate".to_string(),
            redis_url: "redis://cache:6379".to_string(),
            trusted_proxies: "10.0.0.0/8".parse().unwrap_or_default(),
            store_timeout_ms: 500,
            state_token_secret: SecretString::from("s3cr3t".to_string()),
            state_token_ttl_minutes: 5,
            google_client_id: "client-id".to_string(),
            google_client_secret: SecretString::from("client-secret".to_string()),
            google_redirect_url: "https://app.tld/cb".to_string(),
            google_auth_base_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            google_token_exchange_url: "https://oauth2.googleapis.com/token".to_string(),
            http_timeout_seconds: 10,
            token_lifespan_seconds: 3600,
            max_clients: 10,
        };

        let message = startup_message(&args);
        assert!(message.contains("\n  listen:                    tcp:8080"));
        assert!(message.contains("\n  trusted_proxies:           10.0.0.0/8"));
        assert!(message.contains("REDACTED"));
        for secret in ["hunter2", "s3cr3t", "client-secret"] {
            assert!(!message.contains(secret), "{secret} leaked");
        }
    }

    #[test]
    fn short_commit_truncates() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("abc"), "abc");
    }
}
