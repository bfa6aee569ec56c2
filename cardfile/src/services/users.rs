//! Users service
//!
//! Account records and password verification. Hashes are produced by the
//! caller (see `crypto`) and only ever replaced through `set_password_hash`.

use crate::config::{MAX_EMAIL_LENGTH, MAX_USERNAME_LENGTH};
use crate::crypto;
use crate::database::{NewUser, Repository, UpdateUserRequest, User};
use crate::error::{AppError, Result};

/// Service for managing user accounts
#[derive(Clone)]
pub struct UserService {
    repo: Repository,
}

impl UserService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// All users, oldest first
    pub async fn get_all(&self) -> Result<Vec<User>> {
        self.repo.list_users().await
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>> {
        self.repo.get_user(id).await
    }

    /// Case-sensitive exact match
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        self.repo.get_user_by_username(username).await
    }

    /// The earliest-created user
    pub async fn earliest(&self) -> Result<Option<User>> {
        self.repo.earliest_user().await
    }

    /// Create a user from an already hashed password
    pub async fn add(&self, user: NewUser) -> Result<User> {
        if user.password_hash.is_empty() {
            tracing::warn!("Rejected user without password hash: {}", user.username);
            return Err(AppError::validation("password hash is required"));
        }
        validate_account(&user.username, user.email.as_deref())?;

        tracing::info!("Creating user: {}", user.username);

        let user = self.repo.create_user(user).await?;

        tracing::info!("User created successfully: {}", user.id);

        Ok(user)
    }

    /// Copy username, email and active flag. The hash is left alone.
    pub async fn update(&self, req: UpdateUserRequest) -> Result<Option<User>> {
        validate_account(&req.username, req.email.as_deref())?;

        tracing::debug!("Updating user: {}", req.id);

        self.repo.update_user(req).await
    }

    /// Delete a user; their cards go with them
    pub async fn delete(&self, id: &str) -> Result<()> {
        tracing::info!("Deleting user: {}", id);

        if !self.repo.delete_user(id).await? {
            tracing::debug!("No user to delete: {}", id);
        }

        Ok(())
    }

    /// Check a plaintext password against the stored hash
    pub async fn validate_password(&self, username: &str, password: &str) -> Result<bool> {
        let Some(user) = self.repo.get_user_by_username(username).await? else {
            return Ok(false);
        };

        Ok(crypto::verify_password(password, &user.password_hash))
    }

    /// Replace a stored hash. Returns false for unknown ids.
    pub async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<bool> {
        if password_hash.is_empty() {
            return Err(AppError::validation("password hash is required"));
        }

        let updated = self.repo.set_password_hash(id, password_hash).await?;
        if updated {
            tracing::info!("Password changed for user: {}", id);
        }

        Ok(updated)
    }
}

fn validate_account(username: &str, email: Option<&str>) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(AppError::validation(format!(
            "username exceeds {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    if let Some(email) = email {
        if email.chars().count() > MAX_EMAIL_LENGTH {
            return Err(AppError::validation(format!(
                "email exceeds {} characters",
                MAX_EMAIL_LENGTH
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::initialize_database;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_service() -> UserService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        UserService::new(Repository::new(pool))
    }

    fn new_user(username: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: Some(format!("{}@example.com", username)),
            password_hash: crypto::hash_password(password).unwrap(),
            is_active: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_assigns_id_and_timestamp() {
        let service = create_test_service().await;

        let user = service.add(new_user("ana", "secret")).await.unwrap();

        assert!(!user.id.is_empty());
        assert_eq!(service.get_by_id(&user.id).await.unwrap().unwrap().username, "ana");
    }

    #[tokio::test]
    async fn test_add_rejects_empty_hash() {
        let service = create_test_service().await;

        let result = service
            .add(NewUser {
                username: "ana".to_string(),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(service.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let service = create_test_service().await;

        service.add(new_user("ana", "one")).await.unwrap();
        let mut second = new_user("ana", "two");
        second.email = None;

        assert!(service.add(second).await.is_err());
    }

    #[tokio::test]
    async fn test_validate_password() {
        let service = create_test_service().await;
        service.add(new_user("ana", "secret")).await.unwrap();

        assert!(service.validate_password("ana", "secret").await.unwrap());
        assert!(!service.validate_password("ana", "wrong").await.unwrap());
        assert!(!service.validate_password("nobody", "secret").await.unwrap());
        assert!(!service.validate_password("Ana", "secret").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_never_touches_hash() {
        let service = create_test_service().await;
        let user = service.add(new_user("ana", "secret")).await.unwrap();

        let updated = service
            .update(UpdateUserRequest {
                id: user.id.clone(),
                username: "ana.b".to_string(),
                email: None,
                is_active: false,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.username, "ana.b");
        assert!(!updated.is_active);
        assert_eq!(updated.created_at, user.created_at);
        assert!(service.validate_password("ana.b", "secret").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_unknown_is_none() {
        let service = create_test_service().await;

        let result = service
            .update(UpdateUserRequest {
                id: "missing".to_string(),
                username: "ghost".to_string(),
                email: None,
                is_active: true,
            })
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_set_password_hash() {
        let service = create_test_service().await;
        let user = service.add(new_user("ana", "old")).await.unwrap();

        let hash = crypto::hash_password("new").unwrap();
        assert!(service.set_password_hash(&user.id, &hash).await.unwrap());
        assert!(!service.set_password_hash("missing", &hash).await.unwrap());

        assert!(service.validate_password("ana", "new").await.unwrap());
        assert!(!service.validate_password("ana", "old").await.unwrap());
    }

    #[tokio::test]
    async fn test_earliest_and_delete() {
        let service = create_test_service().await;

        let mut first = new_user("first", "pw");
        first.created_at = Some(chrono::Utc::now() - chrono::Duration::days(1));
        let first = service.add(first).await.unwrap();
        service.add(new_user("second", "pw")).await.unwrap();

        assert_eq!(service.earliest().await.unwrap().unwrap().id, first.id);

        service.delete(&first.id).await.unwrap();
        service.delete(&first.id).await.unwrap();

        assert_eq!(service.earliest().await.unwrap().unwrap().username, "second");
    }
}
