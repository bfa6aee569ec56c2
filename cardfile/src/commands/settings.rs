//! Settings-related commands
//!
//! The settings file is the source of truth. Each change is mirrored into
//! the `app_configs` table so database-side tools see the same values.

use crate::app::AppState;
use crate::database::AppConfig;
use crate::error::Result;
use crate::services::AppSettings;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SettingsView {
    pub settings_path: String,
    /// Database in use by this process
    pub database_path: String,
    pub settings: Option<AppSettings>,
    pub app_config: Option<AppConfig>,
}

pub async fn show_settings(state: &AppState) -> Result<SettingsView> {
    Ok(SettingsView {
        settings_path: state.settings.path().to_string_lossy().to_string(),
        database_path: state.db_path.to_string_lossy().to_string(),
        settings: state.settings.get_current_settings().await,
        app_config: state.app_configs.get_current_config().await?,
    })
}

pub async fn set_language(state: &AppState, language: String) -> Result<SettingsView> {
    state.settings.update_language(language.trim()).await?;
    sync_app_config(state).await?;

    show_settings(state).await
}

/// Point the settings at another database. Takes effect on next start.
pub async fn set_database(
    state: &AppState,
    database_type: String,
    connection_string: String,
) -> Result<SettingsView> {
    state
        .settings
        .update_database_configuration(&database_type, &connection_string)
        .await?;
    sync_app_config(state).await?;

    tracing::warn!("Database configuration updated. Restart required for changes to take effect.");

    show_settings(state).await
}

/// Copy the settings file into the current `app_configs` record
async fn sync_app_config(state: &AppState) -> Result<AppConfig> {
    let settings = state.settings.get_current_settings().await.unwrap_or_default();
    let current = state.app_configs.get_current_config().await?.unwrap_or_default();

    let last_user = settings.last_user.filter(|u| !u.username.is_empty());
    let config = AppConfig {
        database_type: settings.database_configuration.database_type,
        connection_string: Some(settings.database_configuration.connection_string),
        language: Some(settings.language),
        remember_credentials: last_user
            .as_ref()
            .is_some_and(|u| u.remember_credentials),
        remember_user: last_user.is_some(),
        last_user_email: last_user
            .as_ref()
            .map(|u| u.email.clone())
            .filter(|e| !e.is_empty()),
        last_login_date: last_user.as_ref().and_then(|u| u.last_login),
        last_user: last_user.map(|u| u.username),
        ..current
    };

    state.app_configs.set_current_config(config).await
}
