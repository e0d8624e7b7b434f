//! Request fingerprint binding a login attempt to the client that started it.

use axum::http::{header::USER_AGENT, HeaderMap};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    str::FromStr,
};

use super::error::{AuthError, AuthResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub user_agent: String,
    pub ip_address: String,
}

impl Fingerprint {
    #[must_use]
    pub fn new(user_agent: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ip_address: ip_address.into(),
        }
    }

    /// Build the fingerprint of an inbound request.
    ///
    /// The client IP is the peer address. Forwarding headers are only read
    /// when the peer is one of `trusted` proxies: the rightmost
    /// `x-forwarded-for` hop that is not itself trusted wins, then
    /// `x-real-ip`. A missing `User-Agent` is recorded as empty.
    ///
    /// # Errors
    /// Returns `InvalidRequestType` when the `User-Agent` header is not valid
    /// visible ASCII or the peer address is unknown.
    pub fn from_request(
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
        trusted: &TrustedProxies,
    ) -> AuthResult<Self> {
        let user_agent = match headers.get(USER_AGENT) {
            Some(value) => value
                .to_str()
                .map_err(|_| AuthError::InvalidRequestType("invalid User-Agent header".to_string()))?
                .to_string(),
            None => String::new(),
        };

        let peer = peer.map(|addr| canonical_ip(addr.ip())).ok_or_else(|| {
            AuthError::InvalidRequestType("unable to determine client address".to_string())
        })?;

        let client = if trusted.contains(peer) {
            forwarded_client_ip(headers, trusted).unwrap_or(peer)
        } else {
            peer
        };

        Ok(Self {
            user_agent,
            ip_address: client.to_string(),
        })
    }

    /// `true` when both the user agent and the client address match.
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        self.user_agent == other.user_agent && self.ip_address == other.ip_address
    }
}

/// Record persisted in the state store for each pending login attempt.
pub type PendingAuthAttempt = Fingerprint;

/// Reverse proxies allowed to report the client address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrustedProxies(Vec<IpNetwork>);

impl TrustedProxies {
    #[must_use]
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        Self(networks)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = canonical_ip(ip);
        self.0.iter().any(|network| network.contains(ip))
    }
}

impl FromStr for TrustedProxies {
    type Err = AuthError;

    /// Comma separated addresses or CIDR blocks.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<IpNetwork>().map_err(|e| {
                    AuthError::InvalidRequestType(format!("invalid trusted proxy {entry}: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for TrustedProxies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let networks: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&networks.join(","))
    }
}

fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        IpAddr::V4(_) => ip,
    }
}

fn forwarded_client_ip(headers: &HeaderMap, trusted: &TrustedProxies) -> Option<IpAddr> {
    let hops: Vec<&str> = headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();

    if !hops.is_empty() {
        let mut outermost = None;
        for hop in hops.iter().rev() {
            // anything left of an unparsable hop was not written by a trusted proxy
            let ip = canonical_ip(hop.parse::<IpAddr>().ok()?);
            if !trusted.contains(ip) {
                return Some(ip);
            }
            outermost = Some(ip);
        }
        return outermost;
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<IpAddr>().ok())
        .map(canonical_ip)
}
