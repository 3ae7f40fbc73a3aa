// ── Settings persistence rules ──

use std::sync::Arc;

use chrono::Utc;

use crate::error::CoreError;
use crate::model::{
    CURRENT_WIZARD_VERSION, CredentialSettingsPatch, FileCleanSettingsPatch, FrontendSettings,
    ServerSettingsPatch, Settings, TimeoutSettings,
};
use crate::repository::SettingsRepository;

/// Applies partial updates to the settings document and persists them.
///
/// Every mutating method loads the current document, applies the change,
/// saves, and returns what the repository stored.
pub struct SettingsService {
    repository: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    pub fn new(repository: Arc<dyn SettingsRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_or_create(&self) -> Result<Settings, CoreError> {
        Ok(self.repository.get_or_create().await?)
    }

    pub async fn set_wizard_completed(&self, version: u32) -> Result<Settings, CoreError> {
        if version == 0 || version > CURRENT_WIZARD_VERSION {
            return Err(CoreError::validation(
                "wizard_version",
                format!("expected 1..={CURRENT_WIZARD_VERSION}, got {version}"),
            ));
        }
        self.modify(|s| {
            s.wizard.wizard_completed = true;
            s.wizard.wizard_completed_at = Some(Utc::now());
            s.wizard.wizard_version = version;
        })
        .await
    }

    pub async fn patch_server_settings(
        &self,
        patch: ServerSettingsPatch,
    ) -> Result<Settings, CoreError> {
        self.modify(|s| {
            patch.apply(&mut s.server);
        })
        .await
    }

    pub async fn patch_credential_settings(
        &self,
        patch: CredentialSettingsPatch,
    ) -> Result<Settings, CoreError> {
        if patch.jwt_expires_in == Some(0) {
            return Err(CoreError::validation("jwt_expires_in", "must be positive"));
        }
        if patch.refresh_token_expiry == Some(0) {
            return Err(CoreError::validation(
                "refresh_token_expiry",
                "must be positive",
            ));
        }
        self.modify(|s| {
            patch.apply(&mut s.credentials);
        })
        .await
    }

    pub async fn patch_file_clean_settings(
        &self,
        patch: FileCleanSettingsPatch,
    ) -> Result<Settings, CoreError> {
        self.modify(|s| {
            patch.apply(&mut s.file_clean);
        })
        .await
    }

    pub async fn update_frontend_settings(
        &self,
        frontend: FrontendSettings,
    ) -> Result<Settings, CoreError> {
        if frontend.grid_cols == 0 || frontend.grid_rows == 0 {
            return Err(CoreError::validation("frontend", "grid must be at least 1x1"));
        }
        self.modify(|s| {
            s.frontend = frontend;
        })
        .await
    }

    pub async fn update_timeout_settings(
        &self,
        timeout: TimeoutSettings,
    ) -> Result<Settings, CoreError> {
        if timeout.api_timeout_ms == 0 {
            return Err(CoreError::validation("api_timeout_ms", "must be positive"));
        }
        self.modify(|s| {
            s.timeout = timeout;
        })
        .await
    }

    async fn modify<F>(&self, f: F) -> Result<Settings, CoreError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.repository.get_or_create().await?;
        f(&mut settings);
        Ok(self.repository.save(settings).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::repository::InMemorySettingsRepository;

    fn service() -> SettingsService {
        SettingsService::new(Arc::new(InMemorySettingsRepository::new()))
    }

    #[tokio::test]
    async fn wizard_completion_is_persisted() {
        let svc = service();
        svc.set_wizard_completed(1).await.unwrap();
        let stored = svc.get_or_create().await.unwrap();
        assert!(stored.wizard.wizard_completed);
        assert!(stored.wizard.wizard_completed_at.is_some());
    }

    #[tokio::test]
    async fn future_wizard_version_is_rejected() {
        let svc = service();
        assert!(matches!(
            svc.set_wizard_completed(CURRENT_WIZARD_VERSION + 1).await,
            Err(CoreError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn zero_timeout_is_rejected_before_saving() {
        let svc = service();
        let err = svc
            .update_timeout_settings(TimeoutSettings { api_timeout_ms: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(
            svc.get_or_create().await.unwrap().timeout,
            TimeoutSettings::default()
        );
    }
}
