//! In-memory [`Store`] and [`BlobStore`] implementations for testing and
//! embedding.
//!
//! Both keep their state behind `std::sync::RwLock`; no lock is held
//! across an `.await`. Data is lost when the store is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::{CatalogError, Result};
use crate::models::{BlobRef, Category, Item, NewItem};
use crate::validate;

use super::snapshot::CatalogSnapshot;
use super::{BlobStore, CategoryIndex, ItemTable, Store};

fn poisoned<T>(_: PoisonError<T>) -> CatalogError {
    CatalogError::storage(anyhow::anyhow!("catalog lock poisoned"))
}

/// In-memory catalog backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<CatalogSnapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CategoryIndex for InMemoryStore {
    async fn resolve_or_create(&self, name: &str) -> Result<i64> {
        let name = validate::required("category", name)?;
        let mut state = self.state.write().map_err(poisoned)?;
        Ok(state.resolve_or_create(name).0)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.categories.clone())
    }
}

#[async_trait]
impl ItemTable for InMemoryStore {
    async fn insert(&self, category_id: i64, name: &str, image: &BlobRef) -> Result<i64> {
        let name = validate::required("name", name)?;
        let mut state = self.state.write().map_err(poisoned)?;
        Ok(state.insert(category_id, name, image.as_str())?.id)
    }

    async fn list_all(&self) -> Result<Vec<Item>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.items.clone())
    }

    async fn get_by_id(&self, id: i64) -> Result<Item> {
        self.state.read().map_err(poisoned)?.get(id)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Item>> {
        let keyword = validate::keyword(keyword)?;
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.search(keyword))
    }

    async fn delete(&self, id: i64) -> Result<Item> {
        self.state.write().map_err(poisoned)?.delete(id)
    }

    async fn count_by_image(&self, image: &BlobRef) -> Result<u64> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.count_by_image(image))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_categorized(&self, item: &NewItem) -> Result<Item> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.insert_categorized(item)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// In-memory blob backend. Counts physical writes so callers can observe
/// deduplication.
#[derive(Debug)]
pub struct InMemoryBlobStore {
    extension: String,
    blobs: RwLock<BTreeMap<BlobRef, Vec<u8>>>,
    writes: AtomicUsize,
}

impl InMemoryBlobStore {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            blobs: RwLock::new(BTreeMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `put` calls that stored new content.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("jpg")
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<BlobRef> {
        let blob = BlobRef::for_content(bytes, &self.extension);
        let mut blobs = self.blobs.write().map_err(poisoned)?;
        if !blobs.contains_key(&blob) {
            blobs.insert(blob.clone(), bytes.to_vec());
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(blob)
    }

    async fn get(&self, blob: &BlobRef) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.get(blob).cloned())
    }

    async fn exists(&self, blob: &BlobRef) -> bool {
        self.blobs
            .read()
            .map(|blobs| blobs.contains_key(blob))
            .unwrap_or(false)
    }

    async fn remove(&self, blob: &BlobRef) -> Result<()> {
        self.blobs.write().map_err(poisoned)?.remove(blob);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BlobRef>> {
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_put_deduplicates() {
        let blobs = InMemoryBlobStore::default();
        let a = blobs.put(b"pixels").await.unwrap();
        let b = blobs.put(b"pixels").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(blobs.write_count(), 1);
        assert_eq!(blobs.list().await.unwrap(), vec![a.clone()]);

        blobs.remove(&a).await.unwrap();
        blobs.remove(&a).await.unwrap();
        assert!(!blobs.exists(&a).await);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_one_category() {
        let store = Arc::new(InMemoryStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.resolve_or_create("Clothing").await.unwrap() })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids, vec![1]);
        assert_eq!(store.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_categorized_joins_category_name() {
        let store = InMemoryStore::new();
        let item = store
            .insert_categorized(&NewItem {
                name: "Red Shirt".into(),
                category: "Clothing".into(),
                image: BlobRef::for_content(b"a", "jpg"),
            })
            .await
            .unwrap();
        assert_eq!(item.category, "Clothing");
        assert_eq!(store.get_by_id(item.id).await.unwrap(), item);
        assert_eq!(store.search("shirt").await.unwrap(), vec![item]);
        assert!(store.search("").await.is_err());
    }
}
