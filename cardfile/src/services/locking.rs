//! Card locking service
//!
//! Each user may protect cards with a lock password kept apart from the
//! login password. A locked card shows a masked title and no content until
//! the session unlocks it; the unlock lapses after `auto_lock_seconds`.

use crate::config::{DEFAULT_AUTO_LOCK_SECONDS, DEFAULT_MASK_VISIBLE_CHARS, MASK_CHAR};
use crate::crypto;
use crate::database::{Card, LockSettings, Repository};
use crate::error::{AppError, Result};
use crate::services::auth::Session;
use chrono::Utc;
use serde::Deserialize;

/// Requested lock preferences. `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLockSettings {
    pub enabled: bool,
    /// New lock password; only stored while locking is enabled
    pub password: Option<String>,
    /// Needed to replace the password or switch locking off
    pub current_password: Option<String>,
    pub auto_lock_seconds: Option<i64>,
    pub mask_visible_chars: Option<i64>,
}

/// Service for lock preferences and lock password checks
#[derive(Clone)]
pub struct LockService {
    repo: Repository,
}

impl LockService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Stored preferences, or the defaults (locking off) if none were saved
    pub async fn get_settings(&self, user_id: &str) -> Result<LockSettings> {
        Ok(self
            .repo
            .get_lock_settings(user_id)
            .await?
            .unwrap_or_else(|| default_settings(user_id)))
    }

    pub async fn update_settings(
        &self,
        user_id: &str,
        req: UpdateLockSettings,
    ) -> Result<LockSettings> {
        let current = self.get_settings(user_id).await?;

        let new_password = req
            .password
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        let disabling = current.enabled && !req.enabled;

        if current.has_password() && (disabling || new_password.is_some()) {
            let confirmed = match (req.current_password.as_deref(), current.password_hash.as_deref()) {
                (Some(given), Some(hash)) => crypto::verify_password(given, hash),
                _ => false,
            };
            if !confirmed {
                tracing::warn!("Lock settings change refused for {}: wrong lock password", user_id);
                return Err(AppError::InvalidLockPassword);
            }
        }

        if req.enabled && new_password.is_none() && !current.has_password() {
            return Err(AppError::validation(
                "a lock password is required to enable card locking",
            ));
        }

        let password_hash = match new_password {
            Some(password) if req.enabled => Some(crypto::hash_password(password)?),
            _ => current.password_hash,
        };

        let saved = self
            .repo
            .save_lock_settings(&LockSettings {
                user_id: user_id.to_string(),
                enabled: req.enabled,
                auto_lock_seconds: req
                    .auto_lock_seconds
                    .map_or(current.auto_lock_seconds, |s| s.max(0)),
                mask_visible_chars: req
                    .mask_visible_chars
                    .map_or(current.mask_visible_chars, |n| n.max(0)),
                password_hash,
                updated_at: Utc::now(),
            })
            .await?;

        tracing::info!("Lock settings updated for {} (enabled={})", user_id, saved.enabled);

        Ok(saved)
    }

    /// False when no lock password has been set
    pub async fn verify_password(&self, user_id: &str, password: &str) -> Result<bool> {
        let settings = self.get_settings(user_id).await?;

        Ok(settings
            .password_hash
            .as_deref()
            .is_some_and(|hash| crypto::verify_password(password, hash)))
    }
}

fn default_settings(user_id: &str) -> LockSettings {
    LockSettings {
        user_id: user_id.to_string(),
        enabled: false,
        auto_lock_seconds: DEFAULT_AUTO_LOCK_SECONDS,
        mask_visible_chars: DEFAULT_MASK_VISIBLE_CHARS,
        password_hash: None,
        updated_at: Utc::now(),
    }
}

/// Keep the first `visible_chars` characters and mask the rest
pub fn mask_title(title: &str, visible_chars: i64) -> String {
    let visible = usize::try_from(visible_chars).unwrap_or(0);
    let total = title.chars().count();
    if total <= visible {
        return title.to_string();
    }

    title
        .chars()
        .take(visible)
        .chain(std::iter::repeat(MASK_CHAR).take(total - visible))
        .collect()
}

/// Whether `session` currently sees `card` masked
pub fn is_concealed(card: &Card, settings: &LockSettings, session: &Session) -> bool {
    settings.enabled && card.is_locked && !session.is_unlocked(&card.id)
}

/// The card as `session` may see it
pub fn conceal(mut card: Card, settings: &LockSettings, session: &Session) -> Card {
    if is_concealed(&card, settings, session) {
        card.title = mask_title(&card.title, settings.mask_visible_chars);
        card.content = None;
    }
    card
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{initialize_database, NewUser, User};
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_service() -> (LockService, User) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let repo = Repository::new(pool);
        let user = repo
            .create_user(NewUser {
                username: "ana".to_string(),
                password_hash: "$argon2id$stub".to_string(),
                is_active: true,
                ..Default::default()
            })
            .await
            .unwrap();

        (LockService::new(repo), user)
    }

    fn enable(password: &str) -> UpdateLockSettings {
        UpdateLockSettings {
            enabled: true,
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    fn locked_card() -> Card {
        Card {
            id: "c1".to_string(),
            title: "Bank accounts".to_string(),
            content: Some("1234".to_string()),
            created_at: Utc::now(),
            updated_at: None,
            user_id: "u1".to_string(),
            is_active: true,
            deleted_at: None,
            is_locked: true,
            tags: Vec::new(),
        }
    }

    #[test]
    fn test_mask_title() {
        assert_eq!(mask_title("Bank accounts", 4), "Bank\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}\u{2022}");
        assert_eq!(mask_title("Short", 5), "Short");
        assert_eq!(mask_title("Año", 1), "A\u{2022}\u{2022}");
        assert_eq!(mask_title("abc", -2), "\u{2022}\u{2022}\u{2022}");
        assert_eq!(mask_title("", 3), "");
    }

    #[tokio::test]
    async fn test_defaults_when_nothing_saved() {
        let (service, user) = create_test_service().await;

        let settings = service.get_settings(&user.id).await.unwrap();

        assert!(!settings.enabled);
        assert_eq!(settings.auto_lock_seconds, 30);
        assert_eq!(settings.mask_visible_chars, 5);
        assert!(!settings.has_password());
        assert!(!service.verify_password(&user.id, "anything").await.unwrap());
    }

    #[tokio::test]
    async fn test_enable_requires_password() {
        let (service, user) = create_test_service().await;

        let result = service
            .update_settings(
                &user.id,
                UpdateLockSettings {
                    enabled: true,
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let saved = service.update_settings(&user.id, enable("vault")).await.unwrap();
        assert!(saved.enabled);
        assert!(saved.password_hash.as_deref().unwrap().starts_with("$argon2id$"));
        assert!(service.verify_password(&user.id, "vault").await.unwrap());
        assert!(!service.verify_password(&user.id, "Vault").await.unwrap());
    }

    #[tokio::test]
    async fn test_disable_and_replace_need_current_password() {
        let (service, user) = create_test_service().await;
        service.update_settings(&user.id, enable("vault")).await.unwrap();

        let replace = |current: Option<&str>| UpdateLockSettings {
            enabled: true,
            password: Some("new".to_string()),
            current_password: current.map(str::to_string),
            ..Default::default()
        };
        assert!(matches!(
            service.update_settings(&user.id, replace(None)).await,
            Err(AppError::InvalidLockPassword)
        ));
        service
            .update_settings(&user.id, replace(Some("vault")))
            .await
            .unwrap();
        assert!(service.verify_password(&user.id, "new").await.unwrap());

        let disable = |current: &str| UpdateLockSettings {
            enabled: false,
            current_password: Some(current.to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_settings(&user.id, disable("vault")).await,
            Err(AppError::InvalidLockPassword)
        ));
        let saved = service.update_settings(&user.id, disable("new")).await.unwrap();
        assert!(!saved.enabled);
        // Re-enabling reuses the kept password
        let saved = service
            .update_settings(
                &user.id,
                UpdateLockSettings {
                    enabled: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(saved.enabled);
    }

    #[tokio::test]
    async fn test_negative_timings_clamped() {
        let (service, user) = create_test_service().await;

        let saved = service
            .update_settings(
                &user.id,
                UpdateLockSettings {
                    auto_lock_seconds: Some(-10),
                    mask_visible_chars: Some(-1),
                    ..enable("vault")
                },
            )
            .await
            .unwrap();

        assert_eq!(saved.auto_lock_seconds, 0);
        assert_eq!(saved.mask_visible_chars, 0);
    }

    #[test]
    fn test_conceal_respects_session_unlock() {
        let settings = LockSettings {
            enabled: true,
            mask_visible_chars: 4,
            ..default_settings("u1")
        };
        let mut session = Session::new();

        let hidden = conceal(locked_card(), &settings, &session);
        assert!(hidden.title.starts_with("Bank\u{2022}"));
        assert!(hidden.content.is_none());

        session.grant_unlock("c1", Utc::now() + Duration::seconds(30));
        let shown = conceal(locked_card(), &settings, &session);
        assert_eq!(shown.title, "Bank accounts");
        assert_eq!(shown.content.as_deref(), Some("1234"));

        session.grant_unlock("c1", Utc::now() - Duration::seconds(1));
        assert!(is_concealed(&locked_card(), &settings, &session));

        let disabled = default_settings("u1");
        assert!(!is_concealed(&locked_card(), &disabled, &Session::new()));
    }
}
