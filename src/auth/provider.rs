use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::error::AuthError;

/// Identity providers accepted by the login flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Provider {
    Google,
}

impl Provider {
    pub const ALL: [Self; 1] = [Self::Google];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "GOOGLE",
        }
    }

    /// Marker stored on users created through this provider.
    #[must_use]
    pub const fn user_marker(self) -> &'static str {
        match self {
            Self::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuthError::InvalidProvider(s.to_string()))
    }
}
