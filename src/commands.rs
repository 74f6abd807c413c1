//! CLI command implementations.
//!
//! Each `run_*` function opens the configured catalog, performs one
//! operation, and prints the result to stdout. Errors propagate to `main`,
//! which reports them and exits non-zero.

use std::path::Path;

use anyhow::{Context, Result};
use catalog_store_core::Item;

use crate::catalog::open_catalog;
use crate::config::Config;

fn print_item_table(items: &[Item]) {
    if items.is_empty() {
        println!("No items.");
        return;
    }
    println!("{:>5}  {:<24}  {:<16}  IMAGE", "ID", "NAME", "CATEGORY");
    for item in items {
        println!(
            "{:>5}  {:<24}  {:<16}  {}",
            item.id, item.name, item.category, item.image_name
        );
    }
}

fn print_item(item: &Item) {
    println!("id:        {}", item.id);
    println!("name:      {}", item.name);
    println!("category:  {} (id {})", item.category, item.category_id);
    println!("image:     {}", item.image_name);
}

pub async fn run_add(config: &Config, name: &str, category: &str, image: &Path) -> Result<()> {
    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read image file: {}", image.display()))?;
    let catalog = open_catalog(config).await?;
    let item = catalog.add_item(name, category, &bytes).await?;
    println!("Added item {}.", item.id);
    print_item(&item);
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let catalog = open_catalog(config).await?;
    print_item_table(&catalog.list_items().await?);
    Ok(())
}

pub async fn run_get(config: &Config, id: i64) -> Result<()> {
    let catalog = open_catalog(config).await?;
    print_item(&catalog.get_item(id).await?);
    Ok(())
}

pub async fn run_search(config: &Config, keyword: &str) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let items = catalog.search_items(keyword).await?;
    print_item_table(&items);
    Ok(())
}

pub async fn run_delete(config: &Config, id: i64) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let item = catalog.delete_item(id).await?;
    println!("Deleted item {} ({}).", item.id, item.name);
    Ok(())
}

pub async fn run_categories(config: &Config) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let categories = catalog.list_categories().await?;
    if categories.is_empty() {
        println!("No categories.");
    }
    for category in categories {
        println!("{:>5}  {}", category.id, category.name);
    }
    Ok(())
}

/// Report items with missing images and images nothing references.
/// Fails when the catalog is inconsistent.
pub async fn run_check(config: &Config) -> Result<()> {
    let catalog = open_catalog(config).await?;
    let report = catalog.check().await?;

    println!("items:  {}", report.items);
    println!("blobs:  {}", report.blobs);
    for item in &report.dangling {
        println!("missing image: item {} -> {}", item.id, item.image_name);
    }
    for blob in &report.orphans {
        println!("unreferenced image: {}", blob);
    }

    if !report.is_consistent() {
        anyhow::bail!(
            "catalog inconsistent: {} dangling item(s), {} orphan image(s)",
            report.dangling.len(),
            report.orphans.len()
        );
    }
    println!("OK");
    Ok(())
}
