//! Database-backed configuration records
//!
//! The `app_configs` table mirrors the settings file for hosts that keep
//! configuration in the database. The "current" record is the one with the
//! most recent login.

use crate::database::{AppConfig, Repository};
use crate::error::Result;
use chrono::Utc;
use uuid::Uuid;

/// Service for managing configuration records
#[derive(Clone)]
pub struct AppConfigService {
    repo: Repository,
}

impl AppConfigService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn get_all(&self) -> Result<Vec<AppConfig>> {
        self.repo.list_app_configs().await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<AppConfig>> {
        self.repo.get_app_config(id).await
    }

    /// Insert a record, assigning an id when it has none
    pub async fn add(&self, mut config: AppConfig) -> Result<AppConfig> {
        if config.id.is_empty() {
            config.id = Uuid::new_v4().to_string();
        }

        tracing::info!("Creating app config: {}", config.id);

        self.repo.create_app_config(&config).await
    }

    /// `None` for unknown ids
    pub async fn update(&self, config: AppConfig) -> Result<Option<AppConfig>> {
        tracing::debug!("Updating app config: {}", config.id);

        self.repo.update_app_config(&config).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting app config: {}", id);

        self.repo.delete_app_config(id).await?;

        Ok(())
    }

    /// The record with the most recent login
    pub async fn get_current_config(&self) -> Result<Option<AppConfig>> {
        self.repo.current_app_config().await
    }

    /// Upsert a record and make it current
    pub async fn set_current_config(&self, mut config: AppConfig) -> Result<AppConfig> {
        let now = Utc::now();
        config.last_updated = Some(now);
        if config.last_login_date.is_none() {
            config.last_login_date = Some(now);
        }

        if !config.id.is_empty() {
            if let Some(stored) = self.repo.update_app_config(&config).await? {
                tracing::info!("Current app config updated: {}", stored.id);
                return Ok(stored);
            }
        }

        self.add(config).await
    }

    /// Whether any record exists
    pub async fn is_configured(&self) -> Result<bool> {
        Ok(self.repo.count_app_configs().await? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_service() -> AppConfigService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        AppConfigService::new(Repository::new(pool))
    }

    #[tokio::test]
    async fn test_empty_table() {
        let service = create_test_service().await;

        assert!(!service.is_configured().await.unwrap());
        assert!(service.get_current_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_current_inserts_then_updates() {
        let service = create_test_service().await;

        let stored = service
            .set_current_config(AppConfig {
                language: Some("en".to_string()),
                ..AppConfig::default()
            })
            .await
            .unwrap();

        assert!(!stored.id.is_empty());
        assert!(stored.last_updated.is_some());
        assert!(stored.last_login_date.is_some());
        assert!(service.is_configured().await.unwrap());

        let updated = service
            .set_current_config(AppConfig {
                language: Some("fr".to_string()),
                ..stored.clone()
            })
            .await
            .unwrap();

        assert_eq!(updated.id, stored.id);
        assert_eq!(service.get_all().await.unwrap().len(), 1);
        assert_eq!(
            service.get_current_config().await.unwrap().unwrap().language.as_deref(),
            Some("fr")
        );
    }

    #[tokio::test]
    async fn test_current_is_latest_login() {
        let service = create_test_service().await;
        let now = Utc::now();

        service
            .add(AppConfig {
                last_user: Some("old".to_string()),
                last_login_date: Some(now - Duration::days(2)),
                ..AppConfig::default()
            })
            .await
            .unwrap();
        service
            .add(AppConfig {
                last_user: Some("undated".to_string()),
                ..AppConfig::default()
            })
            .await
            .unwrap();
        service
            .add(AppConfig {
                last_user: Some("recent".to_string()),
                last_login_date: Some(now),
                ..AppConfig::default()
            })
            .await
            .unwrap();

        let current = service.get_current_config().await.unwrap().unwrap();
        assert_eq!(current.last_user.as_deref(), Some("recent"));
    }

    #[tokio::test]
    async fn test_update_and_delete_unknown_are_noops() {
        let service = create_test_service().await;

        let missing = service
            .update(AppConfig {
                id: "missing".to_string(),
                ..AppConfig::default()
            })
            .await
            .unwrap();
        assert!(missing.is_none());

        service.delete("missing").await.unwrap();
        assert!(service.get_all().await.unwrap().is_empty());
    }
}
