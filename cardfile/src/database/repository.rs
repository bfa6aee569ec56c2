//! Repository layer for database operations
//!
//! This module provides CRUD operations for all entities.
//! Card writes and their tag diffs share one transaction.

use super::models::*;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

const CARD_COLUMNS: &str =
    "id, title, content, created_at, updated_at, user_id, is_active, deleted_at, is_locked";

/// Row of the card/tag join used to attach tags to loaded cards
#[derive(sqlx::FromRow)]
struct CardTagRow {
    card_id: String,
    id: String,
    name: String,
}

/// Fully resolved card insert, after owner and id defaults are applied
#[derive(Debug, Clone)]
pub struct CardInsert {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_id: String,
    pub tags: Vec<TagRef>,
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ===== Users =====

    /// Create a user
    pub async fn create_user(&self, req: NewUser) -> Result<User> {
        let id = req.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let created_at = req.created_at.unwrap_or_else(Utc::now);

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, email, password_hash, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&req.username)
        .bind(&req.email)
        .bind(&req.password_hash)
        .bind(req.is_active)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created user: {}", id);
        Ok(user)
    }

    /// Get a user by ID
    pub async fn get_user(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Get a user by exact (case-sensitive) username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// List users, oldest first
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }

    /// The earliest-created user, if any
    pub async fn earliest_user(&self) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at ASC, id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update username, email and active flag. Returns `None` for unknown ids.
    pub async fn update_user(&self, req: UpdateUserRequest) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET username = ?, email = ?, is_active = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&req.username)
        .bind(&req.email)
        .bind(req.is_active)
        .bind(&req.id)
        .fetch_optional(&self.pool)
        .await?;

        if user.is_some() {
            tracing::debug!("Updated user: {}", req.id);
        }
        Ok(user)
    }

    /// Replace a user's password hash
    pub async fn set_password_hash(&self, id: &str, password_hash: &str) -> Result<bool> {
        let rows = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Delete a user and, by cascade, their cards
    pub async fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted user: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    // ===== Tags =====

    /// List tags alphabetically
    pub async fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(tags)
    }

    /// List tags alphabetically with how many active cards carry each
    pub async fn list_tags_with_counts(&self) -> Result<Vec<TagUsage>> {
        let tags = sqlx::query_as::<_, TagUsage>(
            r#"
            SELECT t.id, t.name, COUNT(c.id) AS card_count
            FROM tags t
            LEFT JOIN card_tags ct ON ct.tag_id = t.id
            LEFT JOIN cards c ON c.id = ct.card_id AND c.is_active = 1
            GROUP BY t.id, t.name
            ORDER BY t.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(tags)
    }

    pub async fn get_tag(&self, id: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    pub async fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(tag)
    }

    /// Create a tag with an explicit or generated id
    pub async fn create_tag(&self, id: Option<String>, name: &str) -> Result<Tag> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let tag = sqlx::query_as::<_, Tag>(
            "INSERT INTO tags (id, name) VALUES (?, ?) RETURNING id, name",
        )
        .bind(&id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created tag: {} ({})", tag.name, tag.id);
        Ok(tag)
    }

    /// Return the tag with this name, creating it if needed
    pub async fn upsert_tag(&self, name: &str) -> Result<Tag> {
        let mut conn = self.pool.acquire().await?;
        upsert_tag_on(&mut conn, name).await
    }

    /// Rename a tag. Returns `None` for unknown ids.
    pub async fn rename_tag(&self, id: &str, name: &str) -> Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = ? WHERE id = ? RETURNING id, name",
        )
        .bind(name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tag)
    }

    /// Delete a tag; its card links go with it
    pub async fn delete_tag(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted tag: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    /// Join rows for a card
    pub async fn list_card_tags(&self, card_id: &str) -> Result<Vec<CardTag>> {
        let rows = sqlx::query_as::<_, CardTag>(
            "SELECT card_id, tag_id FROM card_tags WHERE card_id = ?",
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ===== Cards =====

    /// Insert a card and link its tags in one transaction
    pub async fn create_card(&self, req: CardInsert) -> Result<Card> {
        let mut tx = self.pool.begin().await?;

        let mut card = sqlx::query_as::<_, Card>(&format!(
            r#"
            INSERT INTO cards (id, title, content, created_at, updated_at, user_id)
            VALUES (?, ?, ?, ?, NULL, ?)
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(&req.id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.created_at)
        .bind(&req.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let tags = resolve_tag_refs(&mut tx, &req.tags).await?;
        for tag in &tags {
            link_tag(&mut tx, &card.id, &tag.id).await?;
        }
        card.tags = tags_for_card(&mut *tx, &card.id).await?;

        tx.commit().await?;

        tracing::debug!("Created card: {} with {} tags", card.id, card.tags.len());
        Ok(card)
    }

    /// Get a card with its tags
    pub async fn get_card(&self, id: &str) -> Result<Option<Card>> {
        let card = sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match card {
            Some(mut card) => {
                card.tags = tags_for_card(&self.pool, &card.id).await?;
                Ok(Some(card))
            }
            None => Ok(None),
        }
    }

    /// List all active cards, newest first
    pub async fn list_cards(&self) -> Result<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(&format!(
            "SELECT {CARD_COLUMNS} FROM cards WHERE is_active = 1 ORDER BY created_at DESC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        self.attach_tags(cards).await
    }

    /// List a user's active cards, newest first
    pub async fn list_cards_by_user(&self, user_id: &str) -> Result<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(&format!(
            r#"
            SELECT {CARD_COLUMNS} FROM cards
            WHERE user_id = ? AND is_active = 1
            ORDER BY created_at DESC, id ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_tags(cards).await
    }

    /// List active cards carrying the named tag, newest first
    pub async fn list_cards_by_tag(&self, tag_name: &str) -> Result<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(
            r#"
            SELECT c.id, c.title, c.content, c.created_at, c.updated_at, c.user_id,
                   c.is_active, c.deleted_at, c.is_locked
            FROM cards c
            JOIN card_tags ct ON ct.card_id = c.id
            JOIN tags t ON t.id = ct.tag_id
            WHERE t.name = ? AND c.is_active = 1
            ORDER BY c.created_at DESC, c.id ASC
            "#,
        )
        .bind(tag_name)
        .fetch_all(&self.pool)
        .await?;

        self.attach_tags(cards).await
    }

    /// Active cards only
    pub async fn count_cards(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn card_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM cards WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(found.is_some())
    }

    /// Update title/content and, when given, replace the tag set.
    ///
    /// Existing links whose tag matches none of the new references (by id or
    /// by name) are removed; links for new tags are added. Tags themselves
    /// are never deleted. Returns `None` for unknown ids.
    pub async fn update_card(&self, req: UpdateCardRequest) -> Result<Option<Card>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Card>(&format!(
            r#"
            UPDATE cards SET title = ?, content = ?, updated_at = ?
            WHERE id = ?
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(&req.title)
        .bind(&req.content)
        .bind(Utc::now())
        .bind(&req.id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut card) = updated else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(refs) = &req.tags {
            let existing = tags_for_card(&mut *tx, &card.id).await?;

            for tag in existing.iter().filter(|t| !refs.iter().any(|r| matches_tag(r, t))) {
                sqlx::query("DELETE FROM card_tags WHERE card_id = ? AND tag_id = ?")
                    .bind(&card.id)
                    .bind(&tag.id)
                    .execute(&mut *tx)
                    .await?;
                tracing::debug!("Unlinked tag {} from card {}", tag.name, card.id);
            }

            let wanted = resolve_tag_refs(&mut tx, refs).await?;
            for tag in &wanted {
                link_tag(&mut tx, &card.id, &tag.id).await?;
            }
        }

        card.tags = tags_for_card(&mut *tx, &card.id).await?;
        tx.commit().await?;

        tracing::debug!("Updated card: {}", card.id);
        Ok(Some(card))
    }

    /// Delete a card; tags links and attachments cascade
    pub async fn delete_card(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM cards WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted card: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    // ===== Recycle bin =====

    /// Move an active card to the recycle bin
    pub async fn trash_card(&self, id: &str, deleted_at: DateTime<Utc>) -> Result<bool> {
        let rows = sqlx::query(
            "UPDATE cards SET is_active = 0, deleted_at = ? WHERE id = ? AND is_active = 1",
        )
        .bind(deleted_at)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    pub async fn restore_card(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query(
            "UPDATE cards SET is_active = 1, deleted_at = NULL WHERE id = ? AND is_active = 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows > 0)
    }

    /// A user's binned cards, most recently binned first
    pub async fn list_trashed_cards(&self, user_id: &str) -> Result<Vec<Card>> {
        let cards = sqlx::query_as::<_, Card>(&format!(
            r#"
            SELECT {CARD_COLUMNS} FROM cards
            WHERE user_id = ? AND is_active = 0
            ORDER BY deleted_at DESC, id ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_tags(cards).await
    }

    /// Permanently delete a binned card. Active cards are left alone.
    pub async fn purge_card(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM cards WHERE id = ? AND is_active = 0")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    /// Permanently delete every binned card of a user
    pub async fn empty_trash(&self, user_id: &str) -> Result<u64> {
        let rows = sqlx::query("DELETE FROM cards WHERE user_id = ? AND is_active = 0")
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Emptied recycle bin of {}: {} cards", user_id, rows);
        Ok(rows)
    }

    // ===== Locking =====

    pub async fn set_card_locked(&self, id: &str, locked: bool) -> Result<bool> {
        let rows = sqlx::query("UPDATE cards SET is_locked = ? WHERE id = ?")
            .bind(locked)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }

    pub async fn get_lock_settings(&self, user_id: &str) -> Result<Option<LockSettings>> {
        let settings = sqlx::query_as::<_, LockSettings>(
            r#"
            SELECT user_id, enabled, auto_lock_seconds, mask_visible_chars, password_hash, updated_at
            FROM lock_settings WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(settings)
    }

    /// Insert or replace a user's lock settings
    pub async fn save_lock_settings(&self, settings: &LockSettings) -> Result<LockSettings> {
        let saved = sqlx::query_as::<_, LockSettings>(
            r#"
            INSERT INTO lock_settings
                (user_id, enabled, auto_lock_seconds, mask_visible_chars, password_hash, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                enabled = excluded.enabled,
                auto_lock_seconds = excluded.auto_lock_seconds,
                mask_visible_chars = excluded.mask_visible_chars,
                password_hash = excluded.password_hash,
                updated_at = excluded.updated_at
            RETURNING user_id, enabled, auto_lock_seconds, mask_visible_chars, password_hash, updated_at
            "#,
        )
        .bind(&settings.user_id)
        .bind(settings.enabled)
        .bind(settings.auto_lock_seconds)
        .bind(settings.mask_visible_chars)
        .bind(&settings.password_hash)
        .bind(settings.updated_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Saved lock settings for {}", saved.user_id);
        Ok(saved)
    }

    async fn attach_tags(&self, mut cards: Vec<Card>) -> Result<Vec<Card>> {
        if cards.is_empty() {
            return Ok(cards);
        }

        let rows = sqlx::query_as::<_, CardTagRow>(
            r#"
            SELECT ct.card_id, t.id, t.name
            FROM card_tags ct
            JOIN tags t ON t.id = ct.tag_id
            ORDER BY t.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_card: HashMap<String, Vec<Tag>> = HashMap::new();
        for row in rows {
            by_card.entry(row.card_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
            });
        }

        for card in &mut cards {
            card.tags = by_card.remove(&card.id).unwrap_or_default();
        }

        Ok(cards)
    }

    // ===== Attachments =====

    /// Store an attachment payload
    pub async fn create_attachment(
        &self,
        card_id: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<CardAttachment> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let attachment = sqlx::query_as::<_, CardAttachment>(
            r#"
            INSERT INTO card_attachments
                (id, card_id, file_name, content_type, file_size, file_data, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(card_id)
        .bind(file_name)
        .bind(content_type)
        .bind(data.len() as i64)
        .bind(data)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created attachment: {} for card: {}", id, card_id);
        Ok(attachment)
    }

    pub async fn get_attachment(&self, id: &str) -> Result<Option<CardAttachment>> {
        let attachment =
            sqlx::query_as::<_, CardAttachment>("SELECT * FROM card_attachments WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(attachment)
    }

    /// List every attachment, newest first
    pub async fn list_attachments(&self) -> Result<Vec<CardAttachment>> {
        let attachments = sqlx::query_as::<_, CardAttachment>(
            "SELECT * FROM card_attachments ORDER BY uploaded_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(attachments)
    }

    /// List attachments for a card, newest first
    pub async fn list_attachments_for_card(&self, card_id: &str) -> Result<Vec<CardAttachment>> {
        let attachments = sqlx::query_as::<_, CardAttachment>(
            r#"
            SELECT * FROM card_attachments WHERE card_id = ? ORDER BY uploaded_at DESC
            "#,
        )
        .bind(card_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attachments)
    }

    /// Payload only
    pub async fn get_attachment_data(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let data: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT file_data FROM card_attachments WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(data)
    }

    pub async fn rename_attachment(
        &self,
        id: &str,
        file_name: &str,
    ) -> Result<Option<CardAttachment>> {
        let attachment = sqlx::query_as::<_, CardAttachment>(
            "UPDATE card_attachments SET file_name = ? WHERE id = ? RETURNING *",
        )
        .bind(file_name)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attachment)
    }

    pub async fn delete_attachment(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM card_attachments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Deleted attachment: {} ({} rows)", id, rows);
        Ok(rows > 0)
    }

    // ===== App configs =====

    pub async fn create_app_config(&self, config: &AppConfig) -> Result<AppConfig> {
        let stored = sqlx::query_as::<_, AppConfig>(
            r#"
            INSERT INTO app_configs (
                id, database_type, connection_string, language, remember_user,
                remember_password, last_user, last_user_email, last_login_date,
                remember_credentials, last_updated
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&config.id)
        .bind(&config.database_type)
        .bind(&config.connection_string)
        .bind(&config.language)
        .bind(config.remember_user)
        .bind(config.remember_password)
        .bind(&config.last_user)
        .bind(&config.last_user_email)
        .bind(config.last_login_date)
        .bind(config.remember_credentials)
        .bind(config.last_updated)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created app config: {}", stored.id);
        Ok(stored)
    }

    pub async fn get_app_config(&self, id: &str) -> Result<Option<AppConfig>> {
        let config = sqlx::query_as::<_, AppConfig>("SELECT * FROM app_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(config)
    }

    pub async fn list_app_configs(&self) -> Result<Vec<AppConfig>> {
        let configs = sqlx::query_as::<_, AppConfig>("SELECT * FROM app_configs")
            .fetch_all(&self.pool)
            .await?;

        Ok(configs)
    }

    /// The record with the most recent login; undated records sort last
    pub async fn current_app_config(&self) -> Result<Option<AppConfig>> {
        let config = sqlx::query_as::<_, AppConfig>(
            r#"
            SELECT * FROM app_configs
            ORDER BY last_login_date IS NULL, last_login_date DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    pub async fn count_app_configs(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_configs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Copy every mutable column. Returns `None` for unknown ids.
    pub async fn update_app_config(&self, config: &AppConfig) -> Result<Option<AppConfig>> {
        let stored = sqlx::query_as::<_, AppConfig>(
            r#"
            UPDATE app_configs SET
                database_type = ?, connection_string = ?, language = ?,
                remember_user = ?, remember_password = ?, last_user = ?,
                last_user_email = ?, last_login_date = ?, remember_credentials = ?,
                last_updated = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&config.database_type)
        .bind(&config.connection_string)
        .bind(&config.language)
        .bind(config.remember_user)
        .bind(config.remember_password)
        .bind(&config.last_user)
        .bind(&config.last_user_email)
        .bind(config.last_login_date)
        .bind(config.remember_credentials)
        .bind(config.last_updated)
        .bind(&config.id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(stored)
    }

    pub async fn delete_app_config(&self, id: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM app_configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows > 0)
    }
}

fn matches_tag(tag_ref: &TagRef, tag: &Tag) -> bool {
    match tag_ref {
        TagRef::Id(id) => *id == tag.id,
        TagRef::Name(name) => *name == tag.name,
    }
}

async fn tags_for_card<'e, E>(executor: E, card_id: &str) -> Result<Vec<Tag>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let tags = sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.name
        FROM card_tags ct
        JOIN tags t ON t.id = ct.tag_id
        WHERE ct.card_id = ?
        ORDER BY t.name ASC
        "#,
    )
    .bind(card_id)
    .fetch_all(executor)
    .await?;

    Ok(tags)
}

async fn upsert_tag_on(conn: &mut SqliteConnection, name: &str) -> Result<Tag> {
    let inserted = sqlx::query("INSERT INTO tags (id, name) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
        .bind(Uuid::new_v4().to_string())
        .bind(name)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if inserted > 0 {
        tracing::debug!("Created tag on first use: {}", name);
    }

    let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    Ok(tag)
}

/// Resolve references to stored tags, creating named ones as needed.
/// Duplicates collapse; unknown ids are an error.
async fn resolve_tag_refs(conn: &mut SqliteConnection, refs: &[TagRef]) -> Result<Vec<Tag>> {
    let mut resolved: Vec<Tag> = Vec::with_capacity(refs.len());

    for tag_ref in refs {
        let tag = match tag_ref {
            TagRef::Name(name) => upsert_tag_on(conn, name).await?,
            TagRef::Id(id) => sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| AppError::TagNotFound(id.clone()))?,
        };

        if !resolved.iter().any(|t| t.id == tag.id) {
            resolved.push(tag);
        }
    }

    Ok(resolved)
}

async fn link_tag(conn: &mut SqliteConnection, card_id: &str, tag_id: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO card_tags (card_id, tag_id) VALUES (?, ?)")
        .bind(card_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema::initialize_database;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_repo() -> Repository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        Repository::new(pool)
    }

    async fn create_owner(repo: &Repository, username: &str) -> User {
        repo.create_user(NewUser {
            username: username.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            is_active: true,
            ..Default::default()
        })
        .await
        .unwrap()
    }

    fn card_insert(owner: &User, title: &str, tags: &[&str]) -> CardInsert {
        CardInsert {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            content: Some(format!("{} body", title)),
            created_at: Utc::now(),
            user_id: owner.id.clone(),
            tags: tags.iter().map(|t| TagRef::name(*t)).collect(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_card() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let card = repo
            .create_card(card_insert(&owner, "Groceries", &["home", "errands"]))
            .await
            .unwrap();

        let fetched = repo.get_card(&card.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Groceries");
        assert_eq!(fetched.content.as_deref(), Some("Groceries body"));
        assert!(fetched.updated_at.is_none());

        let names: Vec<&str> = fetched.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["errands", "home"]);
    }

    #[tokio::test]
    async fn test_tags_shared_between_cards() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let first = repo.create_card(card_insert(&owner, "One", &["work"])).await.unwrap();
        let second = repo.create_card(card_insert(&owner, "Two", &["work"])).await.unwrap();

        let tags = repo.list_tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(first.tags[0].id, second.tags[0].id);
    }

    #[tokio::test]
    async fn test_update_replaces_tag_links() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let card = repo.create_card(card_insert(&owner, "Plan", &["work"])).await.unwrap();

        let updated = repo
            .update_card(UpdateCardRequest {
                id: card.id.clone(),
                title: "Plan".to_string(),
                content: None,
                tags: Some(vec![TagRef::name("personal")]),
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.tags.len(), 1);
        assert_eq!(updated.tags[0].name, "personal");
        assert!(updated.updated_at.is_some());

        // The old tag survives without links
        let work = repo.get_tag_by_name("work").await.unwrap().unwrap();
        let links = repo.list_card_tags(&card.id).await.unwrap();
        assert!(links.iter().all(|l| l.tag_id != work.id));
    }

    #[tokio::test]
    async fn test_update_keeps_tags_matched_by_id() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let card = repo
            .create_card(card_insert(&owner, "Plan", &["work", "ideas"]))
            .await
            .unwrap();
        let work = repo.get_tag_by_name("work").await.unwrap().unwrap();

        let updated = repo
            .update_card(UpdateCardRequest {
                id: card.id.clone(),
                title: "Plan".to_string(),
                content: None,
                tags: Some(vec![TagRef::Id(work.id.clone())]),
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.tags, vec![work]);
    }

    #[tokio::test]
    async fn test_update_without_tags_leaves_links() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let card = repo.create_card(card_insert(&owner, "Plan", &["work"])).await.unwrap();

        let updated = repo
            .update_card(UpdateCardRequest {
                id: card.id.clone(),
                title: "Renamed".to_string(),
                content: Some("new".to_string()),
                tags: None,
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.tags.len(), 1);
        assert_eq!(updated.created_at, card.created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_card_is_none() {
        let repo = create_test_repo().await;

        let result = repo
            .update_card(UpdateCardRequest {
                id: "missing".to_string(),
                title: "x".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tag_id_rolls_back_card() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let mut insert = card_insert(&owner, "Broken", &[]);
        insert.tags = vec![TagRef::Id("nope".to_string())];

        let result = repo.create_card(insert).await;
        assert!(matches!(result, Err(AppError::TagNotFound(_))));
        assert_eq!(repo.count_cards().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_cards_newest_first() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;
        let now = Utc::now();

        for (i, title) in ["old", "middle", "new"].iter().enumerate() {
            let mut insert = card_insert(&owner, title, &[]);
            insert.created_at = now - Duration::hours(10 - i as i64);
            repo.create_card(insert).await.unwrap();
        }

        let titles: Vec<String> = repo
            .list_cards()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();

        assert_eq!(titles, vec!["new", "middle", "old"]);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let card = repo.create_card(card_insert(&owner, "Doomed", &["work"])).await.unwrap();
        repo.create_attachment(&card.id, "a.txt", "text/plain", b"hello")
            .await
            .unwrap();

        assert!(repo.delete_user(&owner.id).await.unwrap());

        assert!(repo.get_card(&card.id).await.unwrap().is_none());
        assert!(repo.list_card_tags(&card.id).await.unwrap().is_empty());
        assert!(repo.list_attachments().await.unwrap().is_empty());
        assert_eq!(repo.list_tags().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_tag_removes_links() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let card = repo.create_card(card_insert(&owner, "Tagged", &["work"])).await.unwrap();
        let tag_id = card.tags[0].id.clone();

        assert!(repo.delete_tag(&tag_id).await.unwrap());

        let card = repo.get_card(&card.id).await.unwrap().unwrap();
        assert!(card.tags.is_empty());
    }

    #[tokio::test]
    async fn test_tag_counts() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        repo.create_card(card_insert(&owner, "One", &["work", "ideas"])).await.unwrap();
        repo.create_card(card_insert(&owner, "Two", &["work"])).await.unwrap();
        repo.create_tag(None, "unused").await.unwrap();

        let counts = repo.list_tags_with_counts().await.unwrap();
        let pairs: Vec<(&str, i64)> = counts.iter().map(|t| (t.name.as_str(), t.card_count)).collect();

        assert_eq!(pairs, vec![("ideas", 1), ("unused", 0), ("work", 2)]);
    }

    #[tokio::test]
    async fn test_recycle_bin_lifecycle() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        let kept = repo.create_card(card_insert(&owner, "Kept", &["work"])).await.unwrap();
        let binned = repo.create_card(card_insert(&owner, "Binned", &["work"])).await.unwrap();

        assert!(repo.trash_card(&binned.id, Utc::now()).await.unwrap());
        assert!(!repo.trash_card(&binned.id, Utc::now()).await.unwrap());

        let active: Vec<String> = repo
            .list_cards_by_user(&owner.id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(active, vec![kept.id.clone()]);
        assert_eq!(repo.list_cards_by_tag("work").await.unwrap().len(), 1);
        assert_eq!(repo.count_cards().await.unwrap(), 1);
        assert_eq!(repo.list_tags_with_counts().await.unwrap()[0].card_count, 1);

        let trash = repo.list_trashed_cards(&owner.id).await.unwrap();
        assert_eq!(trash.len(), 1);
        assert!(!trash[0].is_active);
        assert!(trash[0].deleted_at.is_some());
        assert_eq!(trash[0].tags.len(), 1);

        // Purge only touches binned cards
        assert!(!repo.purge_card(&kept.id).await.unwrap());

        assert!(repo.restore_card(&binned.id).await.unwrap());
        let restored = repo.get_card(&binned.id).await.unwrap().unwrap();
        assert!(restored.is_active);
        assert!(restored.deleted_at.is_none());

        repo.trash_card(&kept.id, Utc::now()).await.unwrap();
        repo.trash_card(&binned.id, Utc::now()).await.unwrap();
        assert_eq!(repo.empty_trash(&owner.id).await.unwrap(), 2);
        assert!(repo.get_card(&kept.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_settings_upsert() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;

        assert!(repo.get_lock_settings(&owner.id).await.unwrap().is_none());

        let mut settings = LockSettings {
            user_id: owner.id.clone(),
            enabled: true,
            auto_lock_seconds: 30,
            mask_visible_chars: 5,
            password_hash: Some("$argon2id$stub".to_string()),
            updated_at: Utc::now(),
        };
        repo.save_lock_settings(&settings).await.unwrap();

        settings.auto_lock_seconds = 0;
        let saved = repo.save_lock_settings(&settings).await.unwrap();
        assert_eq!(saved.auto_lock_seconds, 0);
        assert!(saved.has_password());

        let card = repo.create_card(card_insert(&owner, "Secret", &[])).await.unwrap();
        assert!(!card.is_locked);
        assert!(repo.set_card_locked(&card.id, true).await.unwrap());
        assert!(repo.get_card(&card.id).await.unwrap().unwrap().is_locked);

        repo.delete_user(&owner.id).await.unwrap();
        assert!(repo.get_lock_settings(&owner.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attachments() {
        let repo = create_test_repo().await;
        let owner = create_owner(&repo, "ana").await;
        let card = repo.create_card(card_insert(&owner, "Files", &[])).await.unwrap();

        let attachment = repo
            .create_attachment(&card.id, "scan.pdf", "application/pdf", &[1, 2, 3, 4])
            .await
            .unwrap();

        assert_eq!(attachment.file_size, 4);

        let data = repo.get_attachment_data(&attachment.id).await.unwrap();
        assert_eq!(data, Some(vec![1, 2, 3, 4]));

        let listed = repo.list_attachments_for_card(&card.id).await.unwrap();
        assert_eq!(listed.len(), 1);

        assert!(repo.delete_attachment(&attachment.id).await.unwrap());
        assert!(!repo.delete_attachment(&attachment.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_current_app_config_prefers_latest_login() {
        let repo = create_test_repo().await;
        let now = Utc::now();

        for (id, login) in [
            ("undated", None),
            ("older", Some(now - Duration::days(2))),
            ("newer", Some(now)),
        ] {
            repo.create_app_config(&AppConfig {
                id: id.to_string(),
                last_login_date: login,
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let current = repo.current_app_config().await.unwrap().unwrap();
        assert_eq!(current.id, "newer");
        assert_eq!(repo.count_app_configs().await.unwrap(), 3);
    }
}
