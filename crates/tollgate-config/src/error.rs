//! Configuration error types.
//!
//! Every variant is a startup failure: a gateway whose configuration does
//! not load and validate never starts serving.

use std::path::PathBuf;
use thiserror::Error;

/// Why a gateway configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required configuration file is missing. Optional layers are
    /// skipped instead.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// A configuration file exists but could not be read.
    #[error("failed to read configuration file {path}")]
    Read {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A layer is in a format other than TOML or JSON.
    #[error("unsupported configuration format for {0}; expected toml or json")]
    UnsupportedFormat(String),

    /// A TOML layer is not syntactically valid.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON layer is not syntactically valid.
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// The merged layers do not fit the gateway schema, for example a
    /// misspelled key or a category name that does not exist.
    #[error("configuration does not match the gateway schema: {0}")]
    Schema(#[source] serde_json::Error),

    /// A `.env` file exists but is malformed.
    #[error("invalid .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// A `PREFIX__SECTION__KEY` override could not be parsed for its field.
    #[error("invalid override {var}: {reason}")]
    EnvVar {
        /// The environment variable name.
        var: String,
        /// What the field expected.
        reason: String,
    },

    /// A field parsed but breaks a gateway invariant, such as a zero
    /// collaborator timeout or CSRF disabled outside development.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: String,
        /// Why the value is rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Missing required file.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Unreadable file.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Value that breaks an invariant.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Unparseable environment override.
    pub fn env_var(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvVar {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
