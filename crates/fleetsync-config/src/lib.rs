//! Configuration for the fleetsync binary.
//!
//! A TOML file plus `FLEETSYNC_` environment overrides, merged with
//! figment and translated into `fleetsync_core::FleetConfig` and an
//! initial settings document. The core crate never reads files or env.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetsync_core::FleetConfig;
use fleetsync_core::config::{DEFAULT_DIFF_CHANNEL_CAPACITY, DEFAULT_EVENT_CHANNEL_CAPACITY};
use fleetsync_core::model::{CredentialSettingsPatch, Settings};

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `FLEETSYNC_RUNTIME__EVENT_CHANNEL_CAPACITY=64`.
pub const ENV_PREFIX: &str = "FLEETSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// Seed for a fresh settings document.
    #[serde(default)]
    pub settings: SettingsSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeSection {
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default = "default_diff_capacity")]
    pub diff_channel_capacity: usize,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_capacity(),
            diff_channel_capacity: default_diff_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
fn default_diff_capacity() -> usize {
    DEFAULT_DIFF_CHANNEL_CAPACITY
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettingsSection {
    #[serde(default)]
    pub debug_socket_messages: bool,

    #[serde(default = "default_true")]
    pub login_required: bool,

    #[serde(default)]
    pub registration: bool,

    #[serde(default = "default_jwt_expiry")]
    pub jwt_expires_in_secs: u64,

    /// JWT secret (plaintext; prefer `FLEETSYNC_SETTINGS__JWT_SECRET`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            debug_socket_messages: false,
            login_required: true,
            registration: false,
            jwt_expires_in_secs: default_jwt_expiry(),
            jwt_secret: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_jwt_expiry() -> u64 {
    3600
}

impl SettingsSection {
    /// A settings document with this section applied over the defaults.
    pub fn to_settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.server.debug_settings.debug_socket_messages = self.debug_socket_messages;
        settings.server.login_required = self.login_required;
        settings.server.registration = self.registration;
        settings.credentials.jwt_expires_in = self.jwt_expires_in_secs;
        if let Some(secret) = &self.jwt_secret {
            settings.credentials.jwt_secret = SecretString::from(secret.clone());
        }
        settings
    }

    /// Credential values to force into an existing document on start.
    pub fn credential_overrides(&self) -> CredentialSettingsPatch {
        CredentialSettingsPatch {
            jwt_secret: self.jwt_secret.clone().map(SecretString::from),
            ..CredentialSettingsPatch::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "fleetsync", "fleetsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetsync");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path` + environment. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate and translate into the core runtime config.
pub fn to_fleet_config(cfg: &Config) -> Result<FleetConfig, ConfigError> {
    if cfg.runtime.event_channel_capacity == 0 {
        return Err(ConfigError::Validation {
            field: "runtime.event_channel_capacity".into(),
            reason: "must be greater than zero".into(),
        });
    }
    if cfg.runtime.diff_channel_capacity == 0 {
        return Err(ConfigError::Validation {
            field: "runtime.diff_channel_capacity".into(),
            reason: "must be greater than zero".into(),
        });
    }
    if cfg.settings.jwt_expires_in_secs == 0 {
        return Err(ConfigError::Validation {
            field: "settings.jwt_expires_in_secs".into(),
            reason: "must be greater than zero".into(),
        });
    }

    Ok(FleetConfig {
        event_channel_capacity: cfg.runtime.event_channel_capacity,
        diff_channel_capacity: cfg.runtime.diff_channel_capacity,
        credential_overrides: cfg.settings.credential_overrides(),
    })
}
