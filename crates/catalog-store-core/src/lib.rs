//! # Catalog Store Core
//!
//! Runtime-free logic for Catalog Store: data models, the error taxonomy,
//! input validation, the storage contracts, and in-memory reference
//! implementations of those contracts.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Native backends
//! (SQLite, JSON file, filesystem blobs) live in the `catalog-store` crate.

pub mod error;
pub mod models;
pub mod store;
pub mod validate;

pub use error::{CatalogError, Result};
pub use models::{BlobRef, Category, Item, NewItem};
