//! Settings service
//!
//! Manages application settings persistence using a JSON file. The file may
//! hold other top-level sections; this service only owns `cardfileSettings`.

use crate::config::{
    DEFAULT_CONNECTION_STRING, DEFAULT_DATABASE_TYPE, DEFAULT_LANGUAGE, SETTINGS_FILE_NAME,
    SETTINGS_SECTION,
};
use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfiguration {
    /// "SQLite" is the only type this build can open
    #[serde(default = "default_database_type")]
    pub database_type: String,
    #[serde(default = "default_connection_string")]
    pub connection_string: String,
    /// Provider-specific extras, kept verbatim
    #[serde(default)]
    pub additional_settings: BTreeMap<String, String>,
}

fn default_database_type() -> String {
    DEFAULT_DATABASE_TYPE.to_string()
}

fn default_connection_string() -> String {
    DEFAULT_CONNECTION_STRING.to_string()
}

impl Default for DatabaseConfiguration {
    fn default() -> Self {
        Self {
            database_type: default_database_type(),
            connection_string: default_connection_string(),
            additional_settings: BTreeMap::new(),
        }
    }
}

impl DatabaseConfiguration {
    /// Resolve the SQLite file this configuration points at.
    ///
    /// Accepts `Data Source=<path>` (other `;` keys ignored), `sqlite://<path>`,
    /// `sqlite:<path>` or a bare path. Relative paths resolve against `base_dir`.
    pub fn sqlite_path(&self, base_dir: &Path) -> Result<PathBuf> {
        if !self.database_type.trim().eq_ignore_ascii_case("sqlite") {
            return Err(AppError::UnsupportedDatabase(self.database_type.clone()));
        }

        let raw = self.connection_string.trim();

        let path = if let Some(rest) = raw
            .strip_prefix("sqlite://")
            .or_else(|| raw.strip_prefix("sqlite:"))
        {
            rest.split('?').next().unwrap_or(rest)
        } else if raw.contains('=') {
            raw.split(';')
                .filter_map(|part| part.split_once('='))
                .find(|(key, _)| {
                    let key = key.trim();
                    key.eq_ignore_ascii_case("data source")
                        || key.eq_ignore_ascii_case("datasource")
                        || key.eq_ignore_ascii_case("filename")
                })
                .map(|(_, value)| value.trim())
                .ok_or_else(|| {
                    AppError::validation("connection string has no Data Source entry")
                })?
        } else {
            raw
        };

        if path.is_empty() {
            return Err(AppError::validation("connection string has an empty path"));
        }

        let path = Path::new(path);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(base_dir.join(path))
        }
    }
}

/// The last user that signed in, for "remember me"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub remember_credentials: bool,
    /// Missing or null counts as never signed in
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_login: Option<DateTime<Utc>>,
}

impl LastUserInfo {
    /// Record written on logout
    pub fn empty() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            remember_credentials: false,
            last_login: Some(Utc::now()),
        }
    }
}

/// Application settings section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub is_configured: bool,
    #[serde(default)]
    pub database_configuration: DatabaseConfiguration,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub last_user: Option<LastUserInfo>,
    #[serde(default = "Utc::now", deserialize_with = "timestamp::deserialize")]
    pub last_updated: DateTime<Utc>,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Timestamps in the settings file. RFC 3339 is written; offset-less values
/// such as `2024-01-01T10:00:00` are read as UTC.
mod timestamp {
    use super::*;
    use serde::de::Error as _;

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }

        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub(super) fn deserialize_option<'de, D>(
        deserializer: D,
    ) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw))),
            None => Ok(None),
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            is_configured: false,
            database_configuration: DatabaseConfiguration::default(),
            language: default_language(),
            last_user: None,
            last_updated: Utc::now(),
        }
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
    /// Serializes read-modify-write cycles of clones in this process
    write_lock: Arc<Mutex<()>>,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self::with_path(app_data_dir.join(SETTINGS_FILE_NAME))
    }

    pub fn with_path(settings_path: PathBuf) -> Self {
        Self {
            settings_path,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    /// Read the settings section.
    ///
    /// Missing file, missing section and unreadable content all yield `None`;
    /// failures are logged, not returned.
    pub async fn get_current_settings(&self) -> Option<AppSettings> {
        match self.read_section().await {
            Ok(Some(settings)) => Some(settings),
            Ok(None) => {
                tracing::warn!("No {} found in {:?}", SETTINGS_SECTION, self.settings_path);
                None
            }
            Err(e) => {
                tracing::error!("Failed to load settings from {:?}: {}", self.settings_path, e);
                None
            }
        }
    }

    /// `Ok(None)` only when the file or the section is absent
    async fn read_section(&self) -> Result<Option<AppSettings>> {
        if !self.settings_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let mut document: Map<String, Value> = serde_json::from_str(&content)?;

        match document.remove(SETTINGS_SECTION) {
            Some(section) => Ok(Some(serde_json::from_value(section)?)),
            None => Ok(None),
        }
    }

    /// Stamp, merge and rewrite the settings file. Returns the stored settings.
    pub async fn save_settings(&self, settings: AppSettings) -> Result<AppSettings> {
        let _guard = self.write_lock.lock().await;
        self.write_settings(settings).await
    }

    pub async fn is_configured(&self) -> bool {
        self.get_current_settings()
            .await
            .map(|s| s.is_configured)
            .unwrap_or(false)
    }

    /// Set database type and connection string; marks the app configured
    pub async fn update_database_configuration(
        &self,
        database_type: &str,
        connection_string: &str,
    ) -> Result<()> {
        self.modify(|settings| {
            settings.database_configuration.database_type = database_type.to_string();
            settings.database_configuration.connection_string = connection_string.to_string();
            settings.is_configured = true;
        })
        .await
    }

    pub async fn update_language(&self, language: &str) -> Result<()> {
        self.modify(|settings| settings.language = language.to_string())
            .await
    }

    pub async fn update_last_user(&self, last_user: LastUserInfo) -> Result<()> {
        self.modify(|settings| settings.last_user = Some(last_user))
            .await
    }

    pub async fn get_database_configuration(&self) -> Option<DatabaseConfiguration> {
        self.get_current_settings()
            .await
            .map(|s| s.database_configuration)
    }

    pub async fn get_language(&self) -> String {
        self.get_current_settings()
            .await
            .map(|s| s.language)
            .unwrap_or_else(default_language)
    }

    pub async fn get_last_user(&self) -> Option<LastUserInfo> {
        self.get_current_settings().await.and_then(|s| s.last_user)
    }

    /// Read-modify-write under the lock. A section that exists but does not
    /// parse is left untouched and reported as an error.
    async fn modify(&self, apply: impl FnOnce(&mut AppSettings)) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut settings = match self.read_section().await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(e) => {
                tracing::error!(
                    "Refusing to rewrite unreadable settings at {:?}: {}",
                    self.settings_path,
                    e
                );
                return Err(e);
            }
        };
        apply(&mut settings);
        self.write_settings(settings).await?;

        Ok(())
    }

    async fn write_settings(&self, mut settings: AppSettings) -> Result<AppSettings> {
        settings.last_updated = Utc::now();

        match self.merge_and_write(&settings).await {
            Ok(()) => {
                tracing::info!("Settings saved to {:?}", self.settings_path);
                Ok(settings)
            }
            Err(e) => {
                tracing::error!("Failed to save settings to {:?}: {}", self.settings_path, e);
                Err(e)
            }
        }
    }

    async fn merge_and_write(&self, settings: &AppSettings) -> Result<()> {
        let mut document: Map<String, Value> = if self.settings_path.exists() {
            let content = fs::read_to_string(&self.settings_path).await?;
            if content.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Map::new()
        };

        document.insert(SETTINGS_SECTION.to_string(), serde_json::to_value(settings)?);

        let content = serde_json::to_string_pretty(&Value::Object(document))?;

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a unique temp file beside the target, then rename over it
        let temp_path = self
            .settings_path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &self.settings_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_service() -> (SettingsService, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let service = SettingsService::new(temp_dir.path().to_path_buf());
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_missing_file_yields_none() {
        let (service, _temp) = create_test_service();

        assert!(service.get_current_settings().await.is_none());
        assert!(!service.is_configured().await);
        assert_eq!(service.get_language().await, "es");
        assert!(service.get_last_user().await.is_none());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let (service, _temp) = create_test_service();

        let before = Utc::now();
        let saved = service
            .save_settings(AppSettings {
                language: "en".to_string(),
                ..AppSettings::default()
            })
            .await
            .unwrap();
        assert!(saved.last_updated >= before);

        let loaded = service.get_current_settings().await.unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_file_uses_camel_case_section() {
        let (service, _temp) = create_test_service();

        service
            .update_database_configuration("SQLite", "Data Source=cards.db")
            .await
            .unwrap();

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(service.path()).unwrap()).unwrap();
        let section = &raw["cardfileSettings"];

        assert_eq!(section["isConfigured"], Value::Bool(true));
        assert_eq!(
            section["databaseConfiguration"]["connectionString"],
            Value::String("Data Source=cards.db".to_string())
        );
        assert!(section["databaseConfiguration"]["additionalSettings"].is_object());
        assert!(section.get("lastUpdated").is_some());
    }

    #[tokio::test]
    async fn test_unrelated_keys_preserved() {
        let (service, _temp) = create_test_service();

        std::fs::write(
            service.path(),
            r#"{"Logging": {"LogLevel": {"Default": "Information"}}, "AllowedHosts": "*"}"#,
        )
        .unwrap();

        service.update_language("fr").await.unwrap();

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(service.path()).unwrap()).unwrap();
        assert_eq!(raw["AllowedHosts"], Value::String("*".to_string()));
        assert_eq!(raw["Logging"]["LogLevel"]["Default"], "Information");
        assert_eq!(service.get_language().await, "fr");
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_none() {
        let (service, _temp) = create_test_service();

        std::fs::write(service.path(), "{ not json").unwrap();

        assert!(service.get_current_settings().await.is_none());
        assert!(service.update_language("en").await.is_err());
    }

    #[tokio::test]
    async fn test_missing_section_reads_as_none() {
        let (service, _temp) = create_test_service();

        std::fs::write(service.path(), r#"{"other": 1}"#).unwrap();

        assert!(service.get_current_settings().await.is_none());
    }

    #[tokio::test]
    async fn test_narrow_setters_preserve_other_fields() {
        let (service, _temp) = create_test_service();

        service.update_language("de").await.unwrap();
        service
            .update_last_user(LastUserInfo {
                username: "ana".to_string(),
                email: "ana@example.com".to_string(),
                remember_credentials: true,
                last_login: Some(Utc::now()),
            })
            .await
            .unwrap();
        service
            .update_database_configuration("SQLite", "other.db")
            .await
            .unwrap();

        let settings = service.get_current_settings().await.unwrap();
        assert_eq!(settings.language, "de");
        assert_eq!(settings.last_user.unwrap().username, "ana");
        assert_eq!(settings.database_configuration.connection_string, "other.db");
        assert!(settings.is_configured);
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_fields() {
        let (service, _temp) = create_test_service();

        let lang = {
            let service = service.clone();
            tokio::spawn(async move { service.update_language("it").await })
        };
        let user = {
            let service = service.clone();
            tokio::spawn(async move { service.update_last_user(LastUserInfo::empty()).await })
        };

        lang.await.unwrap().unwrap();
        user.await.unwrap().unwrap();

        let settings = service.get_current_settings().await.unwrap();
        assert_eq!(settings.language, "it");
        assert!(settings.last_user.is_some());
    }

    #[tokio::test]
    async fn test_offset_less_timestamps_read_as_utc() {
        let (service, _temp) = create_test_service();

        std::fs::write(
            service.path(),
            r#"{"cardfileSettings": {
                "isConfigured": true,
                "databaseConfiguration": {"databaseType": "SQLite", "connectionString": "Data Source=/srv/real.db"},
                "language": "es",
                "lastUser": {"username": "ana", "rememberCredentials": true, "lastLogin": "2024-01-01T10:00:00"},
                "lastUpdated": "2024-01-01T10:00:00.1234567"
            }}"#,
        )
        .unwrap();

        let settings = service.get_current_settings().await.unwrap();
        let last_login = settings.last_user.unwrap().last_login.unwrap();
        assert_eq!(last_login.to_rfc3339(), "2024-01-01T10:00:00+00:00");

        service.update_language("fr").await.unwrap();

        let settings = service.get_current_settings().await.unwrap();
        assert_eq!(settings.language, "fr");
        assert!(settings.is_configured);
        assert_eq!(
            settings.database_configuration.connection_string,
            "Data Source=/srv/real.db"
        );
    }

    #[tokio::test]
    async fn test_unreadable_section_is_not_overwritten() {
        let (service, _temp) = create_test_service();

        let original = r#"{"cardfileSettings": {
            "isConfigured": true,
            "databaseConfiguration": {"connectionString": "Data Source=/srv/real.db"},
            "lastUpdated": "last tuesday"
        }}"#;
        std::fs::write(service.path(), original).unwrap();

        assert!(service.get_current_settings().await.is_none());
        assert!(service.update_language("fr").await.is_err());
        assert!(service.update_last_user(LastUserInfo::empty()).await.is_err());
        assert_eq!(std::fs::read_to_string(service.path()).unwrap(), original);
    }

    #[tokio::test]
    async fn test_missing_last_login_is_none() {
        let (service, _temp) = create_test_service();

        std::fs::write(
            service.path(),
            r#"{"cardfileSettings": {"lastUser": {"username": "ana", "rememberCredentials": true}}}"#,
        )
        .unwrap();

        let last_user = service.get_last_user().await.unwrap();
        assert_eq!(last_user.username, "ana");
        assert!(last_user.last_login.is_none());
    }

    #[test]
    fn test_sqlite_path_forms() {
        let base = Path::new("/data");
        let config = |conn: &str| DatabaseConfiguration {
            connection_string: conn.to_string(),
            ..DatabaseConfiguration::default()
        };

        assert_eq!(
            config("Data Source=cardfile.db").sqlite_path(base).unwrap(),
            PathBuf::from("/data/cardfile.db")
        );
        assert_eq!(
            config("data source = /srv/cards.db; Cache=Shared").sqlite_path(base).unwrap(),
            PathBuf::from("/srv/cards.db")
        );
        assert_eq!(
            config("sqlite://notes.db?mode=rwc").sqlite_path(base).unwrap(),
            PathBuf::from("/data/notes.db")
        );
        assert_eq!(
            config("plain.db").sqlite_path(base).unwrap(),
            PathBuf::from("/data/plain.db")
        );
        assert!(config("Cache=Shared").sqlite_path(base).is_err());
    }

    #[test]
    fn test_non_sqlite_database_rejected() {
        let config = DatabaseConfiguration {
            database_type: "PostgreSQL".to_string(),
            ..DatabaseConfiguration::default()
        };

        assert!(matches!(
            config.sqlite_path(Path::new("/data")),
            Err(AppError::UnsupportedDatabase(_))
        ));
    }
}
