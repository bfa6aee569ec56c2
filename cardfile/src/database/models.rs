//! Database models
//!
//! Rust structs representing database entities, plus the request types
//! the services accept. All models use serde for serialization to the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An account that owns cards
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    /// Argon2id PHC string; never leaves the process
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("is_active", &self.is_active)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Create user request. The caller hashes the password.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub id: Option<String>,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Update user request (mutable fields only)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub is_active: bool,
}

/// A short text note
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Card {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub user_id: String,
    /// False while the card sits in the recycle bin
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_locked: bool,
    /// Filled from `card_tags`, alphabetical
    #[sqlx(skip)]
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Per-user card locking preferences
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct LockSettings {
    pub user_id: String,
    pub enabled: bool,
    pub auto_lock_seconds: i64,
    pub mask_visible_chars: i64,
    /// Argon2id PHC string of the lock password
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl LockSettings {
    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}

impl std::fmt::Debug for LockSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockSettings")
            .field("user_id", &self.user_id)
            .field("enabled", &self.enabled)
            .field("auto_lock_seconds", &self.auto_lock_seconds)
            .field("mask_visible_chars", &self.mask_visible_chars)
            .field("has_password", &self.has_password())
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Reference to a tag when creating or editing a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagRef {
    /// An existing tag by id
    Id(String),
    /// A tag by name, created on first use
    Name(String),
}

impl TagRef {
    pub fn name(name: impl Into<String>) -> Self {
        TagRef::Name(name.into())
    }
}

/// Create card request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCardRequest {
    pub id: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Owner; resolved by the card service's owner policy when absent
    pub user_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
}

/// Update card request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCardRequest {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    /// `None` leaves the tag set untouched, `Some` replaces it
    pub tags: Option<Vec<TagRef>>,
}

/// A named label shared across cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
}

/// A tag with the number of cards carrying it
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TagUsage {
    pub id: String,
    pub name: String,
    pub card_count: i64,
}

/// Join row between a card and a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CardTag {
    pub card_id: String,
    pub tag_id: String,
}

/// Binary file attached to a card
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct CardAttachment {
    pub id: String,
    pub card_id: String,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    #[serde(skip)]
    pub file_data: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

impl std::fmt::Debug for CardAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardAttachment")
            .field("id", &self.id)
            .field("card_id", &self.card_id)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("file_size", &self.file_size)
            .field("uploaded_at", &self.uploaded_at)
            .finish()
    }
}

/// Upload request for a card attachment
#[derive(Debug, Clone, Default)]
pub struct NewAttachment {
    pub card_id: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Database-backed configuration record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppConfig {
    pub id: String,
    pub database_type: String,
    pub connection_string: Option<String>,
    pub language: Option<String>,
    pub remember_user: bool,
    pub remember_password: bool,
    pub last_user: Option<String>,
    pub last_user_email: Option<String>,
    pub last_login_date: Option<DateTime<Utc>>,
    pub remember_credentials: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            database_type: crate::config::DEFAULT_DATABASE_TYPE.to_string(),
            connection_string: None,
            language: None,
            remember_user: false,
            remember_password: false,
            last_user: None,
            last_user_email: None,
            last_login_date: None,
            remember_credentials: false,
            last_updated: None,
        }
    }
}
