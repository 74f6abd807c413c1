//! Whole-catalog state as a single value.
//!
//! [`CatalogSnapshot`] holds every category and item plus the id counters.
//! The in-memory store keeps one behind a lock; the JSON file store
//! deserializes one, mutates it, and writes it back.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};
use crate::models::{BlobRef, Category, Item, NewItem};

/// Categories and items, each in id order, with monotonic id counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Highest category id ever assigned.
    #[serde(default)]
    pub last_category_id: i64,
    /// Highest item id ever assigned. Deleted ids are never handed out again.
    #[serde(default)]
    pub last_item_id: i64,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub items: Vec<Item>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category_id(&self, name: &str) -> Option<i64> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    fn category_name(&self, id: i64) -> Option<&str> {
        self.categories
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|idx| self.categories[idx].name.as_str())
    }

    /// Returns the category id and whether it was created by this call.
    pub fn resolve_or_create(&mut self, name: &str) -> (i64, bool) {
        if let Some(id) = self.category_id(name) {
            return (id, false);
        }
        self.last_category_id += 1;
        let id = self.last_category_id;
        self.categories.push(Category {
            id,
            name: name.to_string(),
        });
        (id, true)
    }

    /// Append an item. `image_name` is normally a [`BlobRef`] key; imported
    /// legacy records may carry whatever file name they were written with.
    pub fn insert(&mut self, category_id: i64, name: &str, image_name: &str) -> Result<Item> {
        let category = self
            .category_name(category_id)
            .ok_or(CatalogError::validation("category_id", "unknown category"))?
            .to_string();
        self.last_item_id += 1;
        let item = Item {
            id: self.last_item_id,
            name: name.to_string(),
            category_id,
            category,
            image_name: image_name.to_string(),
        };
        self.items.push(item.clone());
        Ok(item)
    }

    pub fn insert_categorized(&mut self, item: &NewItem) -> Result<Item> {
        let (category_id, _) = self.resolve_or_create(&item.category);
        self.insert(category_id, &item.name, item.image.as_str())
    }

    fn position(&self, id: i64) -> Result<usize> {
        self.items
            .binary_search_by_key(&id, |item| item.id)
            .map_err(|_| CatalogError::NotFound(id))
    }

    pub fn get(&self, id: i64) -> Result<Item> {
        self.position(id).map(|idx| self.items[idx].clone())
    }

    pub fn search(&self, keyword: &str) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.name_matches(keyword))
            .cloned()
            .collect()
    }

    pub fn delete(&mut self, id: i64) -> Result<Item> {
        let idx = self.position(id)?;
        Ok(self.items.remove(idx))
    }

    pub fn count_by_image(&self, image: &BlobRef) -> u64 {
        self.items
            .iter()
            .filter(|item| item.image_name == image.as_str())
            .count() as u64
    }
}
