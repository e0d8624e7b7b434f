//! Identity claims decoded from the provider's ID token.

use base64ct::{Base64UrlUnpadded, Encoding};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::auth::error::{AuthError, AuthResult};

/// Claims keyed case-insensitively: `Email`, `email` and `EMAIL` are the same claim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IdentityClaims {
    claims: HashMap<String, Value>,
}

impl IdentityClaims {
    /// # Errors
    /// Returns `JsonParse` unless `value` is a JSON object.
    pub fn from_value(value: Value) -> AuthResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(AuthError::JsonParse(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            claims: map
                .into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.claims.get(&key.to_lowercase())
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Email claim, trimmed, if present and shaped like an address.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
            .map(str::trim)
            .filter(|email| valid_email(email))
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    /// Accepts both `true` and `"true"`.
    #[must_use]
    pub fn email_verified(&self) -> bool {
        match self.get("email_verified") {
            Some(Value::Bool(verified)) => *verified,
            Some(Value::String(verified)) => verified.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

/// Decode the payload of a compact JWS without verifying its signature.
///
/// Only the structure is checked: three dot separated segments, a base64url
/// JSON header and a base64url JSON object payload.
///
/// # Errors
/// `TokenDecode` for structural problems, `JsonParse` for a non-object payload.
pub fn decode_id_token(id_token: &str) -> AuthResult<IdentityClaims> {
    let mut segments = id_token.trim().split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::TokenDecode("not enough or too many segments".to_string()));
    };

    let header = decode_segment(header)?;
    if !serde_json::from_slice::<Value>(&header).is_ok_and(|value| value.is_object()) {
        return Err(AuthError::TokenDecode("invalid header".to_string()));
    }

    let payload = decode_segment(payload)?;
    let payload: Value =
        serde_json::from_slice(&payload).map_err(|e| AuthError::JsonParse(e.to_string()))?;

    IdentityClaims::from_value(payload)
}

fn decode_segment(segment: &str) -> AuthResult<Vec<u8>> {
    if segment.is_empty() {
        return Err(AuthError::TokenDecode("empty segment".to_string()));
    }
    Base64UrlUnpadded::decode_vec(segment.trim_end_matches('='))
        .map_err(|_| AuthError::TokenDecode("invalid segment encoding".to_string()))
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
