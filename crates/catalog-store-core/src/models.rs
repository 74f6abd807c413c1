//! Core data models used throughout Catalog Store.
//!
//! These types represent the categories, items, and blob references that
//! flow between the facade and the storage backends.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CatalogError, Result};

/// A named category. Created on first use, never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A persisted item joined with its category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    /// Category name, resolved from `category_id`.
    pub category: String,
    /// Blob key of the item's image (`<sha256-hex>.<ext>`).
    pub image_name: String,
}

impl Item {
    /// Whether the item's name contains `keyword`, ignoring case.
    ///
    /// Folding is Unicode-aware, so `"ÉCHARPE"` matches `"écharpe"`. Every
    /// backend filters with this so search behaves the same everywhere.
    pub fn name_matches(&self, keyword: &str) -> bool {
        self.name.to_lowercase().contains(&keyword.to_lowercase())
    }
}

/// A validated insertion request: trimmed names and an already-stored blob.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub image: BlobRef,
}

/// Key of a content-addressed blob: the lowercase hex SHA-256 digest of the
/// blob's bytes followed by a fixed extension, e.g. `9f86…0f00a08.jpg`.
///
/// Only well-formed keys can be constructed, so a `BlobRef` is always safe
/// to join onto a storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    /// Length of a hex-encoded SHA-256 digest.
    pub const DIGEST_LEN: usize = 64;

    /// Derive the key for `bytes`.
    pub fn for_content(bytes: &[u8], extension: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hex::encode(hasher.finalize());
        Self(format!("{}.{}", digest, extension))
    }

    /// Parse a stored key such as an `image_name` column or a URL segment.
    pub fn parse(key: &str) -> Result<Self> {
        let (digest, extension) = key
            .split_once('.')
            .ok_or(CatalogError::validation("image_name", "missing extension"))?;
        if digest.len() != Self::DIGEST_LEN
            || !digest
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        {
            return Err(CatalogError::validation(
                "image_name",
                "not a sha256 hex digest",
            ));
        }
        if !is_valid_extension(extension) {
            return Err(CatalogError::validation("image_name", "invalid extension"));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digest(&self) -> &str {
        &self.0[..Self::DIGEST_LEN]
    }

    pub fn extension(&self) -> &str {
        &self.0[Self::DIGEST_LEN + 1..]
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blob extensions are short ASCII alphanumeric strings (`jpg`, `png`).
pub fn is_valid_extension(extension: &str) -> bool {
    !extension.is_empty()
        && extension.len() <= 16
        && extension.bytes().all(|b| b.is_ascii_alphanumeric())
}
