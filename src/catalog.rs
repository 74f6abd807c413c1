//! The catalog facade.
//!
//! [`Catalog`] composes a [`Store`] and a [`BlobStore`] into the operations
//! exposed to adapters. Adding an item validates input, writes the blob,
//! then commits category and item together:
//!
//! ```text
//! validate ──► BlobStore::put ──► Store::insert_categorized
//!                (dedup)            (category + item, one unit)
//! ```
//!
//! A failure after the blob write leaves an unreferenced blob behind. That
//! is harmless (blobs are content-addressed) and shows up in
//! [`Catalog::check`] as an orphan.
//!
//! Adds hold the publish lock shared from `put` until the item is committed;
//! deleting an unreferenced blob holds it exclusively. A delete can therefore
//! never remove a blob that an in-flight add has just deduplicated against.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use catalog_store_core::store::{BlobStore, Store};
use catalog_store_core::{validate, BlobRef, CatalogError, Category, Item, NewItem, Result};

use crate::blob::FsBlobStore;
use crate::config::{Backend, Config};
use crate::json_store::JsonFileStore;
use crate::sqlite_store::SqliteStore;

/// Catalog facade. Cheap to clone; clones share the same backends.
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    publish: Arc<RwLock<()>>,
}

/// Result of [`Catalog::check`].
#[derive(Debug, Default, Serialize)]
pub struct CheckReport {
    pub items: usize,
    pub blobs: usize,
    /// Items whose image is missing from the blob store.
    pub dangling: Vec<Item>,
    /// Stored blobs no item references.
    pub orphans: Vec<BlobRef>,
}

impl CheckReport {
    pub fn is_consistent(&self) -> bool {
        self.dangling.is_empty() && self.orphans.is_empty()
    }
}

impl Catalog {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            publish: Arc::new(RwLock::new(())),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Store an item with its image.
    ///
    /// Nothing is written unless `name`, `category`, and `image` are all
    /// non-empty. Identical image bytes are stored once.
    pub async fn add_item(&self, name: &str, category: &str, image: &[u8]) -> Result<Item> {
        self.add_item_until(name, category, image, std::future::pending())
            .await
    }

    /// [`add_item`](Self::add_item), abandoned with [`CatalogError::Cancelled`]
    /// if `cancel` completes before the item is committed.
    ///
    /// Cancellation is honored up to the commit; the commit itself always
    /// runs to completion. `Cancelled` therefore means no item or category
    /// was written. A blob that was already published stays, unreferenced.
    pub async fn add_item_until<F>(
        &self,
        name: &str,
        category: &str,
        image: &[u8],
        cancel: F,
    ) -> Result<Item>
    where
        F: Future<Output = ()>,
    {
        let (name, category) = validate::new_item(name, category, image)?;
        tokio::pin!(cancel);

        let (_publishing, blob) = tokio::select! {
            biased;
            _ = &mut cancel => return Err(cancelled(name, category)),
            staged = async {
                let guard = self.publish.read().await;
                let blob = self.blobs.put(image).await?;
                Ok::<_, CatalogError>((guard, blob))
            } => staged?,
        };
        // Last point at which cancellation is honored.
        tokio::select! {
            biased;
            _ = &mut cancel => return Err(cancelled(name, category)),
            _ = std::future::ready(()) => {}
        }

        let item = self
            .store
            .insert_categorized(&NewItem {
                name: name.to_string(),
                category: category.to_string(),
                image: blob,
            })
            .await?;
        info!(
            id = item.id,
            name = %item.name,
            category = %item.category,
            image = %item.image_name,
            "added item"
        );
        Ok(item)
    }

    /// Every item, in insertion order.
    pub async fn list_items(&self) -> Result<Vec<Item>> {
        self.store.list_all().await
    }

    pub async fn get_item(&self, id: i64) -> Result<Item> {
        self.store.get_by_id(id).await
    }

    /// Items whose name contains `keyword`, ignoring case.
    pub async fn search_items(&self, keyword: &str) -> Result<Vec<Item>> {
        self.store.search(keyword).await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.store.list_categories().await
    }

    /// Delete an item, then its image if no other item still uses it.
    ///
    /// Image removal is best-effort: its failure is logged and the
    /// deletion still succeeds.
    pub async fn delete_item(&self, id: i64) -> Result<Item> {
        let item = self.store.delete(id).await?;
        info!(id, name = %item.name, "deleted item");
        self.release_blob(&item).await;
        Ok(item)
    }

    async fn release_blob(&self, item: &Item) {
        let Ok(blob) = BlobRef::parse(&item.image_name) else {
            debug!(image = %item.image_name, "image is not a blob key, leaving it");
            return;
        };
        let _exclusive = self.publish.write().await;
        match self.store.count_by_image(&blob).await {
            Ok(0) => {
                if let Err(e) = self.blobs.remove(&blob).await {
                    warn!(blob = %blob, error = %e, "failed to remove image");
                } else {
                    debug!(blob = %blob, "removed unreferenced image");
                }
            }
            Ok(remaining) => debug!(blob = %blob, remaining, "image still referenced"),
            Err(e) => warn!(blob = %blob, error = %e, "could not count image references"),
        }
    }

    /// Bytes of a stored image, or `None` if no blob has that key.
    ///
    /// `name` must be a blob key (`<sha256-hex>.<ext>`); anything else is a
    /// validation error, which also rules out path traversal.
    pub async fn image(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let blob = BlobRef::parse(name)?;
        self.blobs.get(&blob).await
    }

    /// Cross-check items against stored blobs.
    pub async fn check(&self) -> Result<CheckReport> {
        let items = self.store.list_all().await?;
        let blobs = self.blobs.list().await?;

        let mut referenced = BTreeSet::new();
        let mut dangling = Vec::new();
        for item in &items {
            if let Ok(blob) = BlobRef::parse(&item.image_name) {
                if self.blobs.exists(&blob).await {
                    referenced.insert(blob);
                    continue;
                }
            }
            warn!(id = item.id, image = %item.image_name, "item image is missing");
            dangling.push(item.clone());
        }
        let orphans: Vec<BlobRef> = blobs
            .iter()
            .filter(|blob| !referenced.contains(*blob))
            .cloned()
            .collect();

        Ok(CheckReport {
            items: items.len(),
            blobs: blobs.len(),
            dangling,
            orphans,
        })
    }
}

fn cancelled(name: &str, category: &str) -> CatalogError {
    debug!(name, category, "add item cancelled");
    CatalogError::Cancelled
}

/// Build the catalog selected by `config`.
pub async fn open_catalog(config: &Config) -> anyhow::Result<Catalog> {
    let blobs = FsBlobStore::open(&config.blobs.root, &config.blobs.extension)
        .await
        .with_context(|| format!("Failed to open blob root {}", config.blobs.root.display()))?;

    let store: Arc<dyn Store> = match config.db.backend {
        Backend::Sqlite => Arc::new(SqliteStore::open(config).await.with_context(|| {
            format!("Failed to open database {}", config.db.path.display())
        })?),
        Backend::Json => Arc::new(JsonFileStore::open(&config.db.path).await.with_context(
            || format!("Failed to open catalog file {}", config.db.path.display()),
        )?),
    };
    debug!(backend = store.backend(), "catalog opened");

    Ok(Catalog::new(store, Arc::new(blobs)))
}
