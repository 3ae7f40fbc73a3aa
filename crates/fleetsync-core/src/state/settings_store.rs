// ── Settings store ──
//
// Holds the last loaded settings document behind an `ArcSwapOption`.
// Readers get a lock-free snapshot; every write goes through the
// service first and then swaps in the document the repository stored.
// Writes are serialized so each read-patch-save sees the previous save
// and the swapped-in document is always the latest one stored.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::CoreError;
use crate::model::{
    CURRENT_WIZARD_VERSION, CredentialSettings, CredentialSettingsPatch, FileCleanSettings,
    FileCleanSettingsPatch, FrontendSettings, PublicSettings, SensitiveSettings, ServerSettings,
    ServerSettingsPatch, Settings, TimeoutSettings, WizardState,
};
use crate::service::SettingsService;

pub struct SettingsStore {
    service: SettingsService,
    current: ArcSwapOption<Settings>,
    writes: Mutex<()>,
}

impl SettingsStore {
    pub fn new(service: SettingsService) -> Self {
        Self {
            service,
            current: ArcSwapOption::empty(),
            writes: Mutex::new(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub async fn load_settings(&self) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let settings = self.service.get_or_create().await?;
        log_diagnostics_state(&settings);
        Ok(self.replace(settings))
    }

    // ── Read views ───────────────────────────────────────────────────

    /// Client-safe view. Credentials are never part of it.
    pub fn get_settings(&self) -> Result<PublicSettings, CoreError> {
        Ok(PublicSettings::from(self.loaded()?.as_ref()))
    }

    pub fn get_settings_sensitive(&self) -> Result<SensitiveSettings, CoreError> {
        Ok(SensitiveSettings::from(self.loaded()?.as_ref()))
    }

    pub fn get_server_settings(&self) -> Result<ServerSettings, CoreError> {
        Ok(self.loaded()?.server.clone())
    }

    pub fn get_frontend_settings(&self) -> Result<FrontendSettings, CoreError> {
        Ok(self.loaded()?.frontend.clone())
    }

    pub fn get_file_clean_settings(&self) -> Result<FileCleanSettings, CoreError> {
        Ok(self.loaded()?.file_clean.clone())
    }

    pub fn get_timeout_settings(&self) -> Result<TimeoutSettings, CoreError> {
        Ok(self.loaded()?.timeout)
    }

    /// Includes the JWT secret. Only for token issuing code paths.
    pub fn get_credential_settings(&self) -> Result<CredentialSettings, CoreError> {
        Ok(self.loaded()?.credentials.clone())
    }

    pub fn is_registration_enabled(&self) -> Result<bool, CoreError> {
        Ok(self.loaded()?.server.registration)
    }

    pub fn get_login_required(&self) -> Result<bool, CoreError> {
        Ok(self.loaded()?.server.login_required)
    }

    pub fn get_wizard_state(&self) -> Result<WizardState, CoreError> {
        let settings = self.loaded()?;
        Ok(WizardState {
            wizard_completed: settings.wizard.wizard_completed,
            wizard_version: settings.wizard.wizard_version,
            latest_wizard_version: CURRENT_WIZARD_VERSION,
        })
    }

    /// Completed at the version this build expects. An older completed
    /// wizard counts as not completed.
    pub fn is_wizard_completed(&self) -> Result<bool, CoreError> {
        let wizard = &self.loaded()?.wizard;
        Ok(wizard.wizard_completed && wizard.wizard_version == CURRENT_WIZARD_VERSION)
    }

    pub fn is_pre_upload_file_clean_enabled(&self) -> Result<bool, CoreError> {
        Ok(self
            .loaded()?
            .file_clean
            .auto_remove_old_files_before_upload)
    }

    /// Live verbose-telegram flag. Read on every telegram, never cached.
    pub fn debug_socket_messages(&self) -> Result<bool, CoreError> {
        Ok(self
            .loaded()?
            .server
            .debug_settings
            .debug_socket_messages)
    }

    // ── Write-through updates ────────────────────────────────────────

    pub async fn set_wizard_completed(&self, version: u32) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let stored = self.service.set_wizard_completed(version).await?;
        Ok(self.replace(stored))
    }

    pub async fn set_registration_enabled(
        &self,
        registration: bool,
    ) -> Result<PublicSettings, CoreError> {
        self.update_server_settings(ServerSettingsPatch {
            registration: Some(registration),
            ..ServerSettingsPatch::default()
        })
        .await
    }

    pub async fn set_login_required(
        &self,
        login_required: bool,
    ) -> Result<PublicSettings, CoreError> {
        self.update_server_settings(ServerSettingsPatch {
            login_required: Some(login_required),
            ..ServerSettingsPatch::default()
        })
        .await
    }

    pub async fn set_whitelist(
        &self,
        enabled: bool,
        ip_addresses: Vec<String>,
    ) -> Result<PublicSettings, CoreError> {
        self.update_server_settings(ServerSettingsPatch {
            whitelist_enabled: Some(enabled),
            whitelisted_ip_addresses: Some(ip_addresses),
            ..ServerSettingsPatch::default()
        })
        .await
    }

    pub async fn set_sentry_diagnostics_enabled(
        &self,
        enabled: bool,
    ) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let stored = self
            .service
            .patch_server_settings(ServerSettingsPatch {
                sentry_diagnostics_enabled: Some(enabled),
                ..ServerSettingsPatch::default()
            })
            .await?;
        log_diagnostics_state(&stored);
        Ok(self.replace(stored))
    }

    pub async fn update_server_settings(
        &self,
        patch: ServerSettingsPatch,
    ) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let stored = self.service.patch_server_settings(patch).await?;
        Ok(self.replace(stored))
    }

    pub async fn update_timeout_settings(
        &self,
        timeout: TimeoutSettings,
    ) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let stored = self.service.update_timeout_settings(timeout).await?;
        Ok(self.replace(stored))
    }

    pub async fn patch_file_clean_settings(
        &self,
        patch: FileCleanSettingsPatch,
    ) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let stored = self.service.patch_file_clean_settings(patch).await?;
        Ok(self.replace(stored))
    }

    pub async fn update_credential_settings(
        &self,
        patch: CredentialSettingsPatch,
    ) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let stored = self.service.patch_credential_settings(patch).await?;
        Ok(self.replace(stored))
    }

    pub async fn update_frontend_settings(
        &self,
        frontend: FrontendSettings,
    ) -> Result<PublicSettings, CoreError> {
        let _write = self.writes.lock().await;
        let stored = self.service.update_frontend_settings(frontend).await?;
        Ok(self.replace(stored))
    }

    /// Persist startup credential overrides, if any were given. With no
    /// overrides the stored document is left alone.
    pub async fn persist_optional_credential_settings(
        &self,
        overrides: CredentialSettingsPatch,
    ) -> Result<(), CoreError> {
        if overrides.jwt_secret.is_none()
            && overrides.jwt_expires_in.is_none()
            && overrides.refresh_token_attempts.is_none()
            && overrides.refresh_token_expiry.is_none()
        {
            return Ok(());
        }
        info!("persisting credential overrides from configuration");
        self.update_credential_settings(overrides).await?;
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn loaded(&self) -> Result<Arc<Settings>, CoreError> {
        self.current.load_full().ok_or_else(|| CoreError::NotLoaded {
            what: "settings".into(),
        })
    }

    fn replace(&self, settings: Settings) -> PublicSettings {
        let view = PublicSettings::from(&settings);
        self.current.store(Some(Arc::new(settings)));
        view
    }
}

fn log_diagnostics_state(settings: &Settings) {
    if settings.server.sentry_diagnostics_enabled {
        info!("remote diagnostics enabled");
    } else {
        info!("remote diagnostics disabled");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};

    use super::*;
    use crate::error::RepositoryError;
    use crate::model::DebugSettings;
    use crate::repository::{InMemorySettingsRepository, SettingsRepository};

    fn store_over(repo: Arc<InMemorySettingsRepository>) -> SettingsStore {
        SettingsStore::new(SettingsService::new(repo))
    }

    fn store() -> SettingsStore {
        store_over(Arc::new(InMemorySettingsRepository::new()))
    }

    #[test]
    fn reads_before_load_fail() {
        let s = store();
        assert!(matches!(s.get_settings(), Err(CoreError::NotLoaded { .. })));
        assert!(matches!(
            s.is_registration_enabled(),
            Err(CoreError::NotLoaded { .. })
        ));
        assert!(s.debug_socket_messages().is_err());
    }

    #[tokio::test]
    async fn load_then_read() {
        let s = store();
        s.load_settings().await.unwrap();
        assert!(s.get_login_required().unwrap());
        assert!(!s.is_registration_enabled().unwrap());
    }

    #[tokio::test]
    async fn debug_flag_toggle_is_visible_immediately() {
        let s = store();
        s.load_settings().await.unwrap();
        assert!(!s.debug_socket_messages().unwrap());

        s.update_server_settings(ServerSettingsPatch {
            debug_settings: Some(DebugSettings {
                debug_socket_messages: true,
            }),
            ..ServerSettingsPatch::default()
        })
        .await
        .unwrap();

        assert!(s.debug_socket_messages().unwrap());
    }

    #[tokio::test]
    async fn old_wizard_version_is_not_completed() {
        let mut doc = Settings::default();
        doc.wizard.wizard_completed = true;
        doc.wizard.wizard_version = 0;
        let s = store_over(Arc::new(InMemorySettingsRepository::with_document(doc)));
        s.load_settings().await.unwrap();

        assert!(!s.is_wizard_completed().unwrap());
        s.set_wizard_completed(CURRENT_WIZARD_VERSION).await.unwrap();
        assert!(s.is_wizard_completed().unwrap());
        assert_eq!(s.get_wizard_state().unwrap().latest_wizard_version, 1);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_document() {
        let repo = Arc::new(InMemorySettingsRepository::new());
        let s = store_over(Arc::clone(&repo));
        s.load_settings().await.unwrap();

        repo.set_offline(true);
        assert!(matches!(
            s.set_registration_enabled(true).await,
            Err(CoreError::Repository(_))
        ));
        assert!(!s.is_registration_enabled().unwrap());
    }

    #[tokio::test]
    async fn credential_overrides_are_persisted() {
        let s = store();
        s.load_settings().await.unwrap();
        s.persist_optional_credential_settings(CredentialSettingsPatch {
            jwt_secret: Some(SecretString::from("from-config".to_string())),
            jwt_expires_in: Some(120),
            ..CredentialSettingsPatch::default()
        })
        .await
        .unwrap();

        let creds = s.get_credential_settings().unwrap();
        assert_eq!(creds.jwt_secret.expose_secret(), "from-config");
        assert_eq!(s.get_settings_sensitive().unwrap().credentials.jwt_expires_in, 120);
    }

    /// Yields between handing out the document and saving it back.
    struct YieldingSettings(InMemorySettingsRepository);

    #[async_trait]
    impl SettingsRepository for YieldingSettings {
        async fn get_or_create(&self) -> Result<Settings, RepositoryError> {
            let doc = self.0.get_or_create().await;
            tokio::task::yield_now().await;
            doc
        }

        async fn save(&self, settings: Settings) -> Result<Settings, RepositoryError> {
            tokio::task::yield_now().await;
            self.0.save(settings).await
        }
    }

    #[tokio::test]
    async fn concurrent_patches_to_different_fields_both_land() {
        let repo = Arc::new(YieldingSettings(InMemorySettingsRepository::new()));
        let service = SettingsService::new(Arc::clone(&repo) as Arc<dyn SettingsRepository>);
        let s = SettingsStore::new(service);
        s.load_settings().await.unwrap();

        let (registration, login) =
            tokio::join!(s.set_registration_enabled(true), s.set_login_required(false));
        registration.unwrap();
        login.unwrap();

        assert!(s.is_registration_enabled().unwrap());
        assert!(!s.get_login_required().unwrap());
        let stored = repo.0.get_or_create().await.unwrap();
        assert!(stored.server.registration);
        assert!(!stored.server.login_required);
    }
}
