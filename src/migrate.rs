//! Database schema migrations (idempotent).

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::{Backend, Config};
use crate::db;

/// Create the catalog schema on an open pool. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // AUTOINCREMENT keeps ids of deleted items from being handed out again.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            image_name TEXT NOT NULL,
            FOREIGN KEY (category_id) REFERENCES categories(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_category_id ON items(category_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_image_name ON items(image_name)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Prepare persistent state for the configured backend.
///
/// For SQLite this creates the database file and schema. The JSON backend
/// needs no schema; only its parent directory is created.
pub async fn run_migrations(config: &Config) -> Result<()> {
    match config.db.backend {
        Backend::Sqlite => {
            let pool = db::connect(config).await?;
            apply_schema(&pool).await?;
            pool.close().await;
        }
        Backend::Json => {
            if let Some(parent) = config.db.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }
    tokio::fs::create_dir_all(&config.blobs.root).await?;
    Ok(())
}
