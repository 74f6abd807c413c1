//! SQLite-backed [`Store`] implementation.
//!
//! Categories and items live in the `categories` and `items` tables created
//! by [`crate::migrate::apply_schema`]. Category uniqueness is enforced by
//! the `UNIQUE(name)` constraint; a lost insert race surfaces as
//! [`CatalogError::Conflict`] and is resolved by re-reading the winner's id.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use catalog_store_core::store::{CategoryIndex, ItemTable, Store};
use catalog_store_core::{validate, BlobRef, CatalogError, Category, Item, NewItem, Result};

use crate::config::Config;
use crate::{db, migrate};

const SELECT_ITEMS: &str = r#"
    SELECT items.id, items.name, items.category_id,
           categories.name AS category, items.image_name
    FROM items
    JOIN categories ON categories.id = items.category_id
"#;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema has already been applied.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and ensure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_category(&self, name: &str) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn create_category(&self, name: &str) -> Result<i64> {
        sqlx::query_scalar("INSERT INTO categories (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    CatalogError::Conflict(name.to_string())
                }
                other => db_err(other),
            })
    }
}

/// `sqlx::Error` is foreign to this crate, so the mapping lives here rather
/// than in a `From` impl.
fn db_err(err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
            CatalogError::validation("category_id", "unknown category")
        }
        other => CatalogError::storage(other),
    }
}

fn item_from_row(row: &SqliteRow) -> Item {
    Item {
        id: row.get("id"),
        name: row.get("name"),
        category_id: row.get("category_id"),
        category: row.get("category"),
        image_name: row.get("image_name"),
    }
}

#[async_trait]
impl CategoryIndex for SqliteStore {
    async fn resolve_or_create(&self, name: &str) -> Result<i64> {
        let name = validate::required("category", name)?;
        if let Some(id) = self.find_category(name).await? {
            return Ok(id);
        }
        match self.create_category(name).await {
            Ok(id) => {
                debug!(category = name, id, "created category");
                Ok(id)
            }
            Err(CatalogError::Conflict(_)) => {
                debug!(category = name, "lost category insert race, re-reading");
                self.find_category(name).await?.ok_or_else(|| {
                    CatalogError::storage(anyhow::anyhow!(
                        "category '{}' missing after a uniqueness conflict",
                        name
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows
            .iter()
            .map(|row| Category {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }
}

#[async_trait]
impl ItemTable for SqliteStore {
    async fn insert(&self, category_id: i64, name: &str, image: &BlobRef) -> Result<i64> {
        let name = validate::required("name", name)?;
        let result =
            sqlx::query("INSERT INTO items (name, category_id, image_name) VALUES (?, ?, ?)")
                .bind(name)
                .bind(category_id)
                .bind(image.as_str())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(result.last_insert_rowid())
    }

    async fn list_all(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!("{} ORDER BY items.id", SELECT_ITEMS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.iter().map(item_from_row).collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Item> {
        let row = sqlx::query(&format!("{} WHERE items.id = ?", SELECT_ITEMS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref()
            .map(item_from_row)
            .ok_or(CatalogError::NotFound(id))
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Item>> {
        let keyword = validate::keyword(keyword)?;
        // SQLite's lower() folds ASCII only, so matching happens here.
        let mut items = self.list_all().await?;
        items.retain(|item| item.name_matches(keyword));
        Ok(items)
    }

    async fn delete(&self, id: i64) -> Result<Item> {
        let item = self.get_by_id(id).await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CatalogError::NotFound(id));
        }
        Ok(item)
    }

    async fn count_by_image(&self, image: &BlobRef) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE image_name = ?")
            .bind(image.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_categorized(&self, item: &NewItem) -> Result<Item> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Write first so the transaction takes the write lock up front;
        // concurrent writers then wait on the busy timeout instead of
        // failing to upgrade a stale read snapshot.
        sqlx::query("INSERT INTO categories (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(&item.category)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let category_id: i64 = sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
            .bind(&item.category)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        let result =
            sqlx::query("INSERT INTO items (name, category_id, image_name) VALUES (?, ?, ?)")
                .bind(&item.name)
                .bind(category_id)
                .bind(item.image.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok(Item {
            id: result.last_insert_rowid(),
            name: item.name.clone(),
            category_id,
            category: item.category.clone(),
            image_name: item.image.as_str().to_string(),
        })
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}
