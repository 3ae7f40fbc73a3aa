// ── Settings document ──
//
// One process-wide configuration document, split into sections. The
// credential section carries the JWT secret and is never part of a
// public view.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Wizard version the running build expects to have been completed.
pub const CURRENT_WIZARD_VERSION: u32 = 1;

// ── Sections ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSettings {
    /// Log every socket telegram as it enters the event cache.
    pub debug_socket_messages: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub registration: bool,
    pub login_required: bool,
    pub sentry_diagnostics_enabled: bool,
    pub debug_settings: DebugSettings,
    pub whitelist_enabled: bool,
    pub whitelisted_ip_addresses: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            registration: false,
            login_required: true,
            sentry_diagnostics_enabled: false,
            debug_settings: DebugSettings::default(),
            whitelist_enabled: false,
            whitelisted_ip_addresses: vec!["127.0.0.1".into(), "::1".into()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialSettings {
    pub jwt_secret: SecretString,
    /// Seconds.
    pub jwt_expires_in: u64,
    pub refresh_token_attempts: u32,
    /// Seconds.
    pub refresh_token_expiry: u64,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::from(uuid::Uuid::new_v4().simple().to_string()),
            jwt_expires_in: 3600,
            refresh_token_attempts: 50,
            refresh_token_expiry: 14 * 24 * 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSettings {
    pub wizard_completed: bool,
    pub wizard_completed_at: Option<DateTime<Utc>>,
    pub wizard_version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrontendSettings {
    pub large_tiles: bool,
    pub grid_cols: u32,
    pub grid_rows: u32,
}

impl Default for FrontendSettings {
    fn default() -> Self {
        Self {
            large_tiles: false,
            grid_cols: 8,
            grid_rows: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCleanSettings {
    pub auto_remove_old_files_before_upload: bool,
    pub auto_remove_old_files_at_boot: bool,
    pub auto_remove_old_files_criterium_days: u32,
}

impl Default for FileCleanSettings {
    fn default() -> Self {
        Self {
            auto_remove_old_files_before_upload: false,
            auto_remove_old_files_at_boot: false,
            auto_remove_old_files_criterium_days: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSettings {
    pub api_timeout_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            api_timeout_ms: 10_000,
        }
    }
}

/// The whole settings document.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub credentials: CredentialSettings,
    pub wizard: WizardSettings,
    pub frontend: FrontendSettings,
    pub file_clean: FileCleanSettings,
    pub timeout: TimeoutSettings,
}

// ── Read views ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicServerSettings {
    pub login_required: bool,
    pub registration: bool,
    pub sentry_diagnostics_enabled: bool,
}

/// Settings safe to hand to any client. Credentials are not included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    pub server: PublicServerSettings,
    pub wizard: WizardSettings,
    pub frontend: FrontendSettings,
    pub file_clean: FileCleanSettings,
    pub timeout: TimeoutSettings,
}

impl From<&Settings> for PublicSettings {
    fn from(s: &Settings) -> Self {
        Self {
            server: PublicServerSettings {
                login_required: s.server.login_required,
                registration: s.server.registration,
                sentry_diagnostics_enabled: s.server.sentry_diagnostics_enabled,
            },
            wizard: s.wizard.clone(),
            frontend: s.frontend.clone(),
            file_clean: s.file_clean.clone(),
            timeout: s.timeout,
        }
    }
}

/// Credential timings without the secret itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSettingsView {
    pub jwt_expires_in: u64,
    pub refresh_token_attempts: u32,
    pub refresh_token_expiry: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveServerSettings {
    pub debug_settings: DebugSettings,
    pub whitelist_enabled: bool,
    pub whitelisted_ip_addresses: Vec<String>,
}

/// Settings for privileged callers only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveSettings {
    pub credentials: CredentialSettingsView,
    pub server: SensitiveServerSettings,
}

impl From<&Settings> for SensitiveSettings {
    fn from(s: &Settings) -> Self {
        Self {
            credentials: CredentialSettingsView {
                jwt_expires_in: s.credentials.jwt_expires_in,
                refresh_token_attempts: s.credentials.refresh_token_attempts,
                refresh_token_expiry: s.credentials.refresh_token_expiry,
            },
            server: SensitiveServerSettings {
                debug_settings: s.server.debug_settings.clone(),
                whitelist_enabled: s.server.whitelist_enabled,
                whitelisted_ip_addresses: s.server.whitelisted_ip_addresses.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState {
    pub wizard_completed: bool,
    pub wizard_version: u32,
    pub latest_wizard_version: u32,
}

// ── Patches ──────────────────────────────────────────────────────────

/// Partial update of [`ServerSettings`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSettingsPatch {
    pub registration: Option<bool>,
    pub login_required: Option<bool>,
    pub sentry_diagnostics_enabled: Option<bool>,
    pub debug_settings: Option<DebugSettings>,
    pub whitelist_enabled: Option<bool>,
    pub whitelisted_ip_addresses: Option<Vec<String>>,
}

impl ServerSettingsPatch {
    pub fn apply(self, target: &mut ServerSettings) {
        if let Some(v) = self.registration {
            target.registration = v;
        }
        if let Some(v) = self.login_required {
            target.login_required = v;
        }
        if let Some(v) = self.sentry_diagnostics_enabled {
            target.sentry_diagnostics_enabled = v;
        }
        if let Some(v) = self.debug_settings {
            target.debug_settings = v;
        }
        if let Some(v) = self.whitelist_enabled {
            target.whitelist_enabled = v;
        }
        if let Some(v) = self.whitelisted_ip_addresses {
            target.whitelisted_ip_addresses = v;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CredentialSettingsPatch {
    pub jwt_secret: Option<SecretString>,
    pub jwt_expires_in: Option<u64>,
    pub refresh_token_attempts: Option<u32>,
    pub refresh_token_expiry: Option<u64>,
}

impl CredentialSettingsPatch {
    pub fn apply(self, target: &mut CredentialSettings) {
        if let Some(v) = self.jwt_secret {
            target.jwt_secret = v;
        }
        if let Some(v) = self.jwt_expires_in {
            target.jwt_expires_in = v;
        }
        if let Some(v) = self.refresh_token_attempts {
            target.refresh_token_attempts = v;
        }
        if let Some(v) = self.refresh_token_expiry {
            target.refresh_token_expiry = v;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCleanSettingsPatch {
    pub auto_remove_old_files_before_upload: Option<bool>,
    pub auto_remove_old_files_at_boot: Option<bool>,
    pub auto_remove_old_files_criterium_days: Option<u32>,
}

impl FileCleanSettingsPatch {
    pub fn apply(self, target: &mut FileCleanSettings) {
        if let Some(v) = self.auto_remove_old_files_before_upload {
            target.auto_remove_old_files_before_upload = v;
        }
        if let Some(v) = self.auto_remove_old_files_at_boot {
            target.auto_remove_old_files_at_boot = v;
        }
        if let Some(v) = self.auto_remove_old_files_criterium_days {
            target.auto_remove_old_files_criterium_days = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn public_view_omits_credentials() {
        let settings = Settings::default();
        let json = serde_json::to_value(PublicSettings::from(&settings)).unwrap_or_default();
        assert!(json.get("credentials").is_none());
        assert_eq!(json["server"]["loginRequired"], true);
    }

    #[test]
    fn server_patch_only_touches_given_fields() {
        let mut server = ServerSettings::default();
        ServerSettingsPatch {
            registration: Some(true),
            ..Default::default()
        }
        .apply(&mut server);

        assert!(server.registration);
        assert!(server.login_required);
    }

    #[test]
    fn credential_patch_replaces_secret() {
        let mut creds = CredentialSettings::default();
        CredentialSettingsPatch {
            jwt_secret: Some(SecretString::from("override".to_string())),
            ..Default::default()
        }
        .apply(&mut creds);
        assert_eq!(creds.jwt_secret.expose_secret(), "override");
        assert_eq!(creds.jwt_expires_in, 3600);
    }
}
