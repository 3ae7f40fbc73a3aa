// ── Runtime configuration ──
//
// Channel sizing and startup overrides for a `FleetState`. Never touches
// disk: the config crate or a test constructs this and hands it in.

use crate::model::CredentialSettingsPatch;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_DIFF_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Bus buffer per subscriber before it lags.
    pub event_channel_capacity: usize,
    /// Diff buffer per cache subscriber before it lags.
    pub diff_channel_capacity: usize,
    /// Credential values persisted into the settings document on start.
    pub credential_overrides: CredentialSettingsPatch,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            diff_channel_capacity: DEFAULT_DIFF_CHANNEL_CAPACITY,
            credential_overrides: CredentialSettingsPatch::default(),
        }
    }
}
