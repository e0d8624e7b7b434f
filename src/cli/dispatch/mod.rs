use crate::{
    auth::TrustedProxies,
    cli::actions::{server::Args, Action},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

fn required(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

fn number(matches: &clap::ArgMatches, name: &str) -> Result<u64> {
    matches
        .get_one::<u64>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))
}

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server(Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: required(matches, "dsn")?,
        redis_url: required(matches, "redis-url")?,
        trusted_proxies: matches
            .get_one::<String>("trusted-proxies")
            .map(|value| value.parse::<TrustedProxies>())
            .transpose()
            .context("Invalid --trusted-proxies")?
            .unwrap_or_default(),
        store_timeout_ms: number(matches, "store-timeout-ms")?,
        state_token_secret: SecretString::from(required(matches, "state-token-secret")?),
        state_token_ttl_minutes: number(matches, "state-token-ttl-minutes")?,
        google_client_id: required(matches, "google-client-id")?,
        google_client_secret: SecretString::from(required(matches, "google-client-secret")?),
        google_redirect_url: required(matches, "google-redirect-url")?,
        google_auth_base_url: required(matches, "google-auth-base-url")?,
        google_token_exchange_url: required(matches, "google-token-exchange-url")?,
        http_timeout_seconds: number(matches, "http-timeout-seconds")?,
        token_lifespan_seconds: number(matches, "token-lifespan-seconds")?,
        max_clients: matches.get_one::<usize>("max-clients").copied().unwrap_or(10),
    }))
}
