use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("oauth-gate")
        .about("Sign in with Google")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("OAUTH_GATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("OAUTH_GATE_DSN")
                .required(true),
        )
        .arg(
            Arg::new("redis-url")
                .long("redis-url")
                .help("Redis URL for pending login attempts")
                .default_value("redis://127.0.0.1:6379")
                .env("OAUTH_GATE_REDIS_URL"),
        )
        .arg(
            Arg::new("store-timeout-ms")
                .long("store-timeout-ms")
                .help("Timeout for each Redis operation, in milliseconds")
                .default_value("500")
                .env("OAUTH_GATE_STORE_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("trusted-proxies")
                .long("trusted-proxies")
                .help("Comma separated proxy addresses or CIDR blocks allowed to set X-Forwarded-For")
                .default_value("")
                .env("OAUTH_GATE_TRUSTED_PROXIES"),
        )
        .arg(
            Arg::new("state-token-secret")
                .long("state-token-secret")
                .help("Secret the state token encryption key is derived from")
                .env("OAUTH_GATE_STATE_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("state-token-ttl-minutes")
                .long("state-token-ttl-minutes")
                .help("How long a login attempt stays valid")
                .default_value("5")
                .env("OAUTH_GATE_STATE_TOKEN_TTL_MINUTES")
                .value_parser(clap::value_parser!(u64).range(1..=1440)),
        )
        .arg(
            Arg::new("google-client-id")
                .long("google-client-id")
                .help("Google OAuth2 client id")
                .env("OAUTH_GATE_GOOGLE_CLIENT_ID")
                .required(true),
        )
        .arg(
            Arg::new("google-client-secret")
                .long("google-client-secret")
                .help("Google OAuth2 client secret")
                .env("OAUTH_GATE_GOOGLE_CLIENT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("google-redirect-url")
                .long("google-redirect-url")
                .help("Callback URL registered with Google, example: https://app.tld/v1/auth/google/callback")
                .env("OAUTH_GATE_GOOGLE_REDIRECT_URL")
                .required(true),
        )
        .arg(
            Arg::new("google-auth-base-url")
                .long("google-auth-base-url")
                .help("Google authorization endpoint")
                .default_value("https://accounts.google.com/o/oauth2/v2/auth")
                .env("OAUTH_GATE_GOOGLE_AUTH_BASE_URL"),
        )
        .arg(
            Arg::new("google-token-exchange-url")
                .long("google-token-exchange-url")
                .help("Google token endpoint")
                .default_value("https://oauth2.googleapis.com/token")
                .env("OAUTH_GATE_GOOGLE_TOKEN_EXCHANGE_URL"),
        )
        .arg(
            Arg::new("http-timeout-seconds")
                .long("http-timeout-seconds")
                .help("Timeout for calls to the Google token endpoint")
                .default_value("10")
                .env("OAUTH_GATE_HTTP_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("token-lifespan-seconds")
                .long("token-lifespan-seconds")
                .help("Lifetime of issued session tokens")
                .default_value("1209600")
                .env("OAUTH_GATE_TOKEN_LIFESPAN_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("max-clients")
                .long("max-clients")
                .help("Session tokens kept per user; the soonest to expire is evicted first")
                .default_value("10")
                .env("OAUTH_GATE_MAX_CLIENTS")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Emit logs as JSON")
                .env("OAUTH_GATE_LOG_JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("OAUTH_GATE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
