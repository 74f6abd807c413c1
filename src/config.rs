//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! backend = "sqlite"            # or "json"
//! path = "./data/catalog.sqlite"
//!
//! [blobs]
//! root = "./images"
//! extension = "jpg"
//!
//! [server]
//! bind = "127.0.0.1:9000"
//! max_upload_bytes = 10485760
//! ```
//!
//! Only `[db].path` is required; everything else has a default.

use anyhow::{bail, Context, Result};
use catalog_store_core::models::is_valid_extension;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub blobs: BlobsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Which store persists categories and items. Chosen once at startup.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// `categories` and `items` tables in SQLite.
    #[default]
    Sqlite,
    /// One JSON document rewritten on every change.
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default)]
    pub backend: Backend,
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlobsConfig {
    #[serde(default = "default_blob_root")]
    pub root: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for BlobsConfig {
    fn default() -> Self {
        Self {
            root: default_blob_root(),
            extension: default_extension(),
        }
    }
}

fn default_blob_root() -> PathBuf {
    PathBuf::from("./images")
}
fn default_extension() -> String {
    "jpg".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:9000".to_string()
}
fn default_max_upload_bytes() -> usize {
    10 << 20
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.db.path.as_os_str().is_empty() {
            bail!("db.path must not be empty");
        }
        if self.db.max_connections == 0 {
            bail!("db.max_connections must be >= 1");
        }
        if !is_valid_extension(&self.blobs.extension) {
            bail!(
                "blobs.extension must be 1-16 ASCII letters or digits, got '{}'",
                self.blobs.extension
            );
        }
        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be > 0");
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
