//! Deployment environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment environment that keys the security-header table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[serde(alias = "dev")]
    Development,
    /// Pre-production.
    Staging,
    /// Production.
    #[default]
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    /// Returns true for staging and production, which are served over TLS.
    #[must_use]
    pub const fn is_deployed(self) -> bool {
        !matches!(self, Self::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}
