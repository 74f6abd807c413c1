//! JSON-file-backed [`Store`] implementation.
//!
//! The whole catalog is one pretty-printed JSON document. Every mutation
//! runs read-modify-write under a single async mutex and publishes the new
//! document with [`write_atomic`], so concurrent readers (which take no
//! lock) always parse a complete file and racing uploads never lose an
//! update.
//!
//! Files written by older versions of the service, a bare array of
//! `{name, category, image_path}` records, are converted when the store is
//! opened: ids are assigned in array order, categories are derived from the
//! names seen, and the file is rewritten in the current format.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use catalog_store_core::store::snapshot::CatalogSnapshot;
use catalog_store_core::store::{CategoryIndex, ItemTable, Store};
use catalog_store_core::{validate, BlobRef, Category, Item, NewItem, Result};

use crate::atomic::write_atomic;

/// Record shape of the older flat-file format.
#[derive(Debug, Deserialize)]
struct LegacyItem {
    name: String,
    category: String,
    image_path: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredCatalog {
    Legacy(Vec<LegacyItem>),
    Current(CatalogSnapshot),
}

impl StoredCatalog {
    fn into_snapshot(self) -> Result<CatalogSnapshot> {
        match self {
            StoredCatalog::Current(snapshot) => Ok(snapshot),
            StoredCatalog::Legacy(records) => {
                let mut snapshot = CatalogSnapshot::new();
                for record in &records {
                    let image_name = Path::new(&record.image_path)
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(&record.image_path);
                    let (category_id, _) = snapshot.resolve_or_create(&record.category);
                    snapshot.insert(category_id, &record.name, image_name)?;
                }
                Ok(snapshot)
            }
        }
    }
}

/// JSON file implementation of the [`Store`] trait.
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`. The file is created on first write; its
    /// parent directory is created now.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let store = Self {
            path,
            write_lock: Mutex::new(()),
        };
        // Fail at startup, not on the first request, if the file is corrupt.
        if let Some(StoredCatalog::Legacy(records)) = store.read_stored().await? {
            let count = records.len();
            let snapshot = StoredCatalog::Legacy(records).into_snapshot()?;
            store.save(&snapshot).await?;
            info!(path = %store.path.display(), items = count, "converted legacy item list");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or blank.
    async fn read_stored(&self) -> Result<Option<StoredCatalog>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn load(&self) -> Result<CatalogSnapshot> {
        match self.read_stored().await? {
            Some(stored) => stored.into_snapshot(),
            None => Ok(CatalogSnapshot::new()),
        }
    }

    async fn save(&self, snapshot: &CatalogSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &bytes).await?;
        debug!(path = %self.path.display(), items = snapshot.items.len(), "rewrote catalog file");
        Ok(())
    }

    /// Run `f` against the current document and persist the result if `f`
    /// succeeds. Nothing is written when `f` fails.
    async fn mutate<T>(&self, f: impl FnOnce(&mut CatalogSnapshot) -> Result<T> + Send) -> Result<T> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load().await?;
        let out = f(&mut snapshot)?;
        self.save(&snapshot).await?;
        Ok(out)
    }

    /// Locked slow path of `resolve_or_create`. The name is re-checked
    /// under the lock since another task may have created it; the file is
    /// only rewritten when a category was actually added.
    async fn create_category(&self, name: &str) -> Result<i64> {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.load().await?;
        let (id, created) = snapshot.resolve_or_create(name);
        if created {
            self.save(&snapshot).await?;
        }
        Ok(id)
    }
}

#[async_trait]
impl CategoryIndex for JsonFileStore {
    async fn resolve_or_create(&self, name: &str) -> Result<i64> {
        let name = validate::required("category", name)?;
        {
            let snapshot = self.load().await?;
            if let Some(id) = snapshot.category_id(name) {
                return Ok(id);
            }
        }
        self.create_category(name).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(self.load().await?.categories)
    }
}

#[async_trait]
impl ItemTable for JsonFileStore {
    async fn insert(&self, category_id: i64, name: &str, image: &BlobRef) -> Result<i64> {
        let name = validate::required("name", name)?;
        self.mutate(|snapshot| Ok(snapshot.insert(category_id, name, image.as_str())?.id))
            .await
    }

    async fn list_all(&self) -> Result<Vec<Item>> {
        Ok(self.load().await?.items)
    }

    async fn get_by_id(&self, id: i64) -> Result<Item> {
        self.load().await?.get(id)
    }

    async fn search(&self, keyword: &str) -> Result<Vec<Item>> {
        let keyword = validate::keyword(keyword)?;
        Ok(self.load().await?.search(keyword))
    }

    async fn delete(&self, id: i64) -> Result<Item> {
        self.mutate(|snapshot| snapshot.delete(id)).await
    }

    async fn count_by_image(&self, image: &BlobRef) -> Result<u64> {
        Ok(self.load().await?.count_by_image(image))
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn insert_categorized(&self, item: &NewItem) -> Result<Item> {
        self.mutate(|snapshot| snapshot.insert_categorized(item)).await
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_store_core::CatalogError;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn new_item(name: &str, category: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            category: category.to_string(),
            image: BlobRef::for_content(name.as_bytes(), "jpg"),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_catalog() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileStore::open(tmp.path().join("data/items.json"))
            .await
            .unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .insert_categorized(&new_item("Red Shirt", "Clothing"))
            .await
            .unwrap();
        store
            .insert_categorized(&new_item("Blue Shirt", "Clothing"))
            .await
            .unwrap();
        store.delete(2).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let items = reopened.list_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Red Shirt");
        let next = reopened
            .insert_categorized(&new_item("Green Shirt", "Clothing"))
            .await
            .unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn test_imports_legacy_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        std::fs::write(
            &path,
            r#"[
                {"name": "jacket", "category": "fashion", "image_path": "images/a.jpg"},
                {"name": "laptop", "category": "electronics", "image_path": "b.jpg"},
                {"name": "scarf", "category": "fashion", "image_path": "images/c.jpg"}
            ]"#,
        )
        .unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        let items = store.list_all().await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].image_name, "a.jpg");
        assert_eq!(items[0].category_id, items[2].category_id);
        assert_eq!(items[1].category, "electronics");
        assert_eq!(store.list_categories().await.unwrap().len(), 2);

        let rewritten: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(rewritten["last_item_id"], 3);
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .insert_categorized(&new_item("Hat", "Clothing"))
            .await
            .unwrap();
        let before = std::fs::read(&path).unwrap();

        let err = store
            .insert(999, "Ghost", &BlobRef::for_content(b"g", "jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = JsonFileStore::open(&path).await.err().unwrap();
        assert!(matches!(err, CatalogError::Storage(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_category_does_not_rewrite_file() {
        use std::os::unix::fs::MetadataExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.json");
        let store = JsonFileStore::open(&path).await.unwrap();
        let id = store.resolve_or_create("Shoes").await.unwrap();
        let inode = std::fs::metadata(&path).unwrap().ino();

        // The locked path, as taken when a racing task created the name first.
        assert_eq!(store.create_category("Shoes").await.unwrap(), id);
        assert_eq!(std::fs::metadata(&path).unwrap().ino(), inode);

        let other = store.create_category("Boots").await.unwrap();
        assert_ne!(other, id);
        assert_ne!(std::fs::metadata(&path).unwrap().ino(), inode);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_lose_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(
            JsonFileStore::open(tmp.path().join("items.json"))
                .await
                .unwrap(),
        );
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert_categorized(&new_item(&format!("item {i}"), "Shoes"))
                        .await
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        let items = store.list_all().await.unwrap();
        assert_eq!(items.len(), 16);
        assert!(items.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(store.list_categories().await.unwrap().len(), 1);
    }
}
