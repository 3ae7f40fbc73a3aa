//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use fleetsync_config::ConfigError;
use fleetsync_core::{CoreError, RepositoryError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const UNAVAILABLE: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(fleetsync::not_found))]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Conflict: {message}")]
    #[diagnostic(code(fleetsync::conflict))]
    Conflict { message: String },

    #[error("Backing store unavailable: {reason}")]
    #[diagnostic(code(fleetsync::unavailable))]
    Unavailable { reason: String },

    #[error("Fleet state failed: {message}")]
    #[diagnostic(code(fleetsync::state))]
    State { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(fleetsync::config_exists),
        help("Pass --force to overwrite it.\nPath: {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(
        code(fleetsync::config),
        help("Check the config file and FLEETSYNC_* environment variables.")
    )]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error("Could not read {path}")]
    #[diagnostic(code(fleetsync::io))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(fleetsync::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Unavailable { .. } => exit_code::UNAVAILABLE,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                resource_type: entity_type,
                identifier,
            },
            CoreError::InvalidKey { key } => Self::Validation {
                field: "key".into(),
                reason: format!("'{key}' is not a usable identifier"),
            },
            CoreError::Validation { field, reason } => Self::Validation { field, reason },
            CoreError::NotLoaded { what } => Self::State {
                message: format!("{what} not loaded"),
            },
            CoreError::Repository(RepositoryError::Unavailable { reason }) => {
                Self::Unavailable { reason }
            }
            CoreError::Repository(RepositoryError::Conflict { message }) => {
                Self::Conflict { message }
            }
            CoreError::Repository(other) => Self::State {
                message: other.to_string(),
            },
        }
    }
}
