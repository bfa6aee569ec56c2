//! Database schema and migrations
//!
//! Creates the card/tag/user tables and applies versioned migrations.
//! Each migration runs in its own transaction and is recorded in `migrations`.

use crate::error::Result;
use sqlx::{sqlite::SqlitePool, Row};

/// Initialize database with schema
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;

    // Cascading deletes depend on this
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current_version: i32 = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    tracing::info!("Current database version: {}", current_version);

    apply_migrations(pool, current_version).await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

async fn apply_migrations(pool: &SqlitePool, current_version: i32) -> Result<()> {
    for (version, sql) in migrations() {
        if version <= current_version {
            continue;
        }

        tracing::info!("Applying migration version {}", version);

        let mut tx = pool.begin().await?;

        for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!("Migration version {} applied successfully", version);
    }

    Ok(())
}

fn migrations() -> Vec<(i32, &'static str)> {
    vec![
        (1, include_str!("migrations/001_initial_schema.sql")),
        (2, include_str!("migrations/002_recycle_bin_and_locking.sql")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_database_creates_tables() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "app_configs",
            "card_attachments",
            "card_tags",
            "cards",
            "lock_settings",
            "migrations",
            "tags",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();

        let applied: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(applied, 2);
    }

    #[tokio::test]
    async fn test_upgrade_keeps_existing_cards_active() {
        let pool = memory_pool().await;

        sqlx::query("CREATE TABLE migrations (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP)")
            .execute(&pool)
            .await
            .unwrap();
        for statement in migrations()[0].1.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }
        sqlx::query("INSERT INTO migrations (version) VALUES (1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO users (id, username, password_hash, created_at) VALUES ('u1', 'ana', 'x', '2024-01-01T00:00:00Z')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO cards (id, title, created_at, user_id) VALUES ('c1', 'Old', '2024-01-01T00:00:00Z', 'u1')")
            .execute(&pool)
            .await
            .unwrap();

        initialize_database(&pool).await.unwrap();

        let (is_active, is_locked): (bool, bool) =
            sqlx::query_as("SELECT is_active, is_locked FROM cards WHERE id = 'c1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(is_active);
        assert!(!is_locked);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let foreign_keys: i32 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn test_tag_names_unique() {
        let pool = memory_pool().await;
        initialize_database(&pool).await.unwrap();

        sqlx::query("INSERT INTO tags (id, name) VALUES ('a', 'work')")
            .execute(&pool)
            .await
            .unwrap();

        let duplicate = sqlx::query("INSERT INTO tags (id, name) VALUES ('b', 'work')")
            .execute(&pool)
            .await;

        assert!(duplicate.is_err());
    }
}
