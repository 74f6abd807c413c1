//! Storage contracts for Catalog Store.
//!
//! The facade talks to two capabilities: a [`Store`] for categories and
//! items, and a [`BlobStore`] for image bytes. Each has several backends
//! (SQLite, JSON file, and in-memory for [`Store`]; filesystem and
//! in-memory for [`BlobStore`]); one of each is chosen at startup.
//!
//! Implementations must be `Send + Sync` to be shared across request tasks.
//!
//! # Operations
//!
//! | Trait | Method | Purpose |
//! |-------|--------|---------|
//! | [`CategoryIndex`] | [`resolve_or_create`](CategoryIndex::resolve_or_create) | Upsert-on-first-use name → id |
//! | [`ItemTable`] | [`insert`](ItemTable::insert) | Append an item under an existing category |
//! | [`ItemTable`] | [`list_all`](ItemTable::list_all) | All items in insertion order |
//! | [`ItemTable`] | [`search`](ItemTable::search) | Case-insensitive substring match on name |
//! | [`Store`] | [`insert_categorized`](Store::insert_categorized) | Resolve category and insert item atomically |
//! | [`BlobStore`] | [`put`](BlobStore::put) | Content-addressed, deduplicating write |

pub mod memory;
pub mod snapshot;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BlobRef, Category, Item, NewItem};

/// Name-to-id mapping with upsert-on-first-use semantics.
#[async_trait]
pub trait CategoryIndex: Send + Sync {
    /// Return the id of category `name`, creating it if absent.
    ///
    /// Concurrent first use of the same name must leave exactly one
    /// category behind; every caller receives its id.
    async fn resolve_or_create(&self, name: &str) -> Result<i64>;

    /// All categories in id order.
    async fn list_categories(&self) -> Result<Vec<Category>>;
}

/// Append-only ordered collection of items.
#[async_trait]
pub trait ItemTable: Send + Sync {
    /// Append an item under an existing category, returning the new id.
    async fn insert(&self, category_id: i64, name: &str, image: &BlobRef) -> Result<i64>;

    /// Every item, in insertion order.
    async fn list_all(&self) -> Result<Vec<Item>>;

    /// Fails with `NotFound` for an unknown id.
    async fn get_by_id(&self, id: i64) -> Result<Item>;

    /// Items whose name contains `keyword`, ignoring case, in insertion order.
    /// An empty keyword is a `Validation` error.
    async fn search(&self, keyword: &str) -> Result<Vec<Item>>;

    /// Remove an item, returning what was removed.
    async fn delete(&self, id: i64) -> Result<Item>;

    /// Number of items whose image is `image`.
    async fn count_by_image(&self, image: &BlobRef) -> Result<u64>;
}

/// A complete catalog backend.
#[async_trait]
pub trait Store: CategoryIndex + ItemTable {
    /// Resolve (or create) the category and insert the item as one unit:
    /// either both are persisted or neither is.
    async fn insert_categorized(&self, item: &NewItem) -> Result<Item>;

    /// Short backend name for logs (`"sqlite"`, `"json"`, `"memory"`).
    fn backend(&self) -> &'static str;
}

/// Content-addressable storage for image bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under their content key. Writing content that is
    /// already present is a no-op returning the existing key.
    async fn put(&self, bytes: &[u8]) -> Result<BlobRef>;

    /// Read a blob, or `None` if it is absent.
    async fn get(&self, blob: &BlobRef) -> Result<Option<Vec<u8>>>;

    async fn exists(&self, blob: &BlobRef) -> bool;

    /// Delete a blob. Absence is not an error.
    async fn remove(&self, blob: &BlobRef) -> Result<()>;

    /// Every stored blob key, sorted.
    async fn list(&self) -> Result<Vec<BlobRef>>;
}
