//! # Catalog Store
//!
//! Durable storage for an item catalog: items with names, normalized
//! categories, and content-addressed images.
//!
//! Uploading the same image twice stores it once. Categories are created on
//! first use and stay unique under concurrent uploads. Category resolution
//! and item insertion commit together or not at all.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐
//! │   CLI    │   │   HTTP   │
//! │(catalog) │   │  (axum)  │
//! └────┬─────┘   └────┬─────┘
//!      └──────┬───────┘
//!             ▼
//!       ┌───────────┐
//!       │  Catalog  │
//!       └─────┬─────┘
//!      ┌──────┴────────┐
//!      ▼               ▼
//! ┌─────────────┐  ┌────────────┐
//! │    Store    │  │ BlobStore  │
//! │ SQLite/JSON │  │ filesystem │
//! └─────────────┘  └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! catalog init
//! catalog add --name "Red Shirt" --category Clothing --image shirt.jpg
//! catalog search shirt
//! catalog serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`catalog`] | The facade and backend selection |
//! | [`blob`] | Filesystem blob store |
//! | [`sqlite_store`] | SQLite backend |
//! | [`json_store`] | JSON file backend |
//! | [`atomic`] | Temp-file-and-rename writes |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`server`] | HTTP adapter |
//! | [`commands`] | CLI commands |
//!
//! Data models, errors, validation, and the storage traits live in
//! `catalog_store_core` and are re-exported here.

pub mod atomic;
pub mod blob;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod json_store;
pub mod migrate;
pub mod server;
pub mod sqlite_store;

pub use catalog::{open_catalog, Catalog, CheckReport};
pub use catalog_store_core::{store, BlobRef, CatalogError, Category, Item, NewItem};
