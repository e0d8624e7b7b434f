//! Google specific pieces of the login flow: authorization URL, code exchange
//! and ID token claims.

mod auth_url;
pub(crate) mod claims;
mod config;
mod exchanger;

pub use auth_url::AuthUrlGenerator;
pub use claims::{decode_id_token, IdentityClaims};
pub use config::GoogleConfig;
pub use exchanger::{CodeExchanger, ExchangeFuture, GoogleTokenExchanger};
