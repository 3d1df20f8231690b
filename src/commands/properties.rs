//! Property management commands

use crate::config::Config;
use crate::error::Result;
use crate::llm::Platform;
use crate::meta::{
    normalize_website, DatasourceType, MetaDb, NewDatasource, Property, PropertyStats,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Property information with stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub id: i64,
    pub name: String,
    pub website: String,
    pub platform: String,
    pub created_at: String,
    pub index_exists: bool,
    pub stats: PropertyStats,
}

impl PropertyInfo {
    pub async fn load(config: &Config, db: &MetaDb, property: Property) -> Result<Self> {
        let stats = db.property_stats(property.id).await?;
        Ok(Self {
            index_exists: config.index_path(property.id).exists(),
            id: property.id,
            name: property.name,
            website: property.website,
            platform: property.platform_name,
            created_at: property.created_at,
            stats,
        })
    }
}

/// Register a website and its `website` datasource
pub async fn cmd_create_property(
    config: &Config,
    db: &MetaDb,
    name: &str,
    website: &str,
    platform: Option<Platform>,
) -> Result<PropertyInfo> {
    let website = normalize_website(website)?;
    let platform = match platform {
        Some(p) => p,
        None => config.llm.platform.parse()?,
    };

    let property = db
        .insert_property(name.trim(), &website, &platform.to_string())
        .await?;
    db.insert_datasource(&NewDatasource::new(
        property.id,
        DatasourceType::Website,
        website.clone(),
    ))
    .await?;

    PropertyInfo::load(config, db, property).await
}

/// List all properties with their stats
pub async fn cmd_list_properties(config: &Config, db: &MetaDb) -> Result<Vec<PropertyInfo>> {
    let properties = db.list_properties().await?;
    let mut result = Vec::with_capacity(properties.len());
    for property in properties {
        result.push(PropertyInfo::load(config, db, property).await?);
    }
    Ok(result)
}

/// Delete a property, its rows, its index and its crawl snapshot
pub async fn cmd_delete_property(config: &Config, db: &MetaDb, key: &str) -> Result<Property> {
    let property = db.find_property(key).await?;
    db.delete_property(property.id).await?;

    for path in [config.index_path(property.id), config.pages_path(property.id)] {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }

    info!("Deleted property '{}'", property.name);
    Ok(property)
}

pub fn print_property(info: &PropertyInfo) {
    println!("• {} [{}]", info.name, info.platform);
    println!("  ID: {}", info.id);
    println!("  Website: {}", info.website);
    println!(
        "  Datasources: {}, Pages: {}, Chunks: {}",
        info.stats.datasource_count, info.stats.page_count, info.stats.chunk_count
    );
    println!(
        "  Index: {}",
        if info.index_exists { "✓ built" } else { "✗ not built" }
    );
}

pub fn print_properties(properties: &[PropertyInfo]) {
    println!("\n🏠 Properties\n");

    if properties.is_empty() {
        println!("No properties registered. Use 'lise properties create' to add one.");
        return;
    }

    for info in properties {
        print_property(info);
        println!();
    }
}
