//! Application state and initialization
//!
//! This module manages the central application state and lifecycle.
//! All services are initialized here and made available through AppState.

use crate::database::{self, Repository};
use crate::error::Result;
use crate::events::AuthEvents;
use crate::services::{
    AppConfigService, AuthService, CardAttachmentService, CardService, LockService,
    SettingsService, TagService, UserService,
};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub db_path: PathBuf,
    pub pool: SqlitePool,
    pub settings: SettingsService,
    pub users: UserService,
    pub tags: TagService,
    pub cards: CardService,
    pub attachments: CardAttachmentService,
    pub locks: LockService,
    pub app_configs: AppConfigService,
    pub auth: AuthService,
    pub events: AuthEvents,
}

impl AppState {
    /// Open the data directory: settings file, database and services.
    ///
    /// The database location comes from the settings file when one is
    /// configured, otherwise `cardfile.db` inside the data directory.
    pub async fn initialize(app_data_dir: impl AsRef<Path>) -> Result<Self> {
        let app_data_dir = app_data_dir.as_ref().to_path_buf();

        tracing::info!("Initializing application");
        tracing::info!("App data directory: {:?}", app_data_dir);

        std::fs::create_dir_all(&app_data_dir)?;

        let settings = SettingsService::new(app_data_dir.clone());
        let db_config = settings
            .get_database_configuration()
            .await
            .unwrap_or_default();
        let db_path = db_config.sqlite_path(&app_data_dir)?;

        let pool = database::create_pool(&db_path).await?;
        let state = Self::with_pool(app_data_dir, db_path, pool, settings);

        tracing::info!("Application initialized successfully");

        Ok(state)
    }

    /// Wire services around an already migrated pool
    pub fn with_pool(
        app_data_dir: PathBuf,
        db_path: PathBuf,
        pool: SqlitePool,
        settings: SettingsService,
    ) -> Self {
        let repo = Repository::new(pool.clone());
        let events = AuthEvents::default();
        let users = UserService::new(repo.clone());
        let auth = AuthService::new(users.clone(), settings.clone(), events.clone());

        Self {
            app_data_dir,
            db_path,
            pool,
            settings,
            users,
            tags: TagService::new(repo.clone()),
            cards: CardService::new(repo.clone()),
            attachments: CardAttachmentService::new(repo.clone()),
            locks: LockService::new(repo.clone()),
            app_configs: AppConfigService::new(repo),
            auth,
            events,
        }
    }

    /// Close the pool so the WAL is checkpointed
    pub async fn shutdown(&self) {
        self.pool.close().await;
        tracing::debug!("Database pool closed");
    }
}
