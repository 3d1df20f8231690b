//! Status command implementation

use super::properties::{cmd_list_properties, PropertyInfo};
use crate::config::Config;
use crate::error::Result;
use crate::meta::{GlobalStats, MetaDb};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub config_exists: bool,
    pub db_path: String,
    pub index_dir: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub llm_platform: String,
    pub db_stats: GlobalStats,
    pub properties: Vec<PropertyInfo>,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        config_exists: config.paths.config_file.exists(),
        db_path: config.paths.db_file.display().to_string(),
        index_dir: config.paths.index_dir.display().to_string(),
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: config.embedding.dimension,
        llm_platform: config.llm.platform.clone(),
        db_stats: db.global_stats().await?,
        properties: cmd_list_properties(config, db).await?,
    })
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 lise Status\n");
    println!(
        "Configuration: {}{}",
        status.config_path,
        if status.config_exists { "" } else { " (defaults, run 'lise init')" }
    );
    println!("Database: {}", status.db_path);
    println!("Indexes: {}", status.index_dir);
    println!(
        "\nEmbedding Model: {} ({} dimensions)",
        status.embedding_model, status.embedding_dimension
    );
    println!("Default Platform: {}", status.llm_platform);
    println!("\nDatabase Stats:");
    println!("  Properties: {}", status.db_stats.property_count);
    println!("  Datasources: {}", status.db_stats.datasource_count);
    println!("  Chunks: {}", status.db_stats.chunk_count);

    for info in &status.properties {
        println!(
            "\n  {} ({}): {} chunks, index {}",
            info.name,
            info.website,
            info.stats.chunk_count,
            if info.index_exists { "✓" } else { "✗" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_reports_properties() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        let db = MetaDb::connect(&config.paths.db_file).await.unwrap();
        db.insert_property("acme", "https://acme.test", "groq")
            .await
            .unwrap();

        let status = cmd_status(&config, &db).await.unwrap();
        assert!(!status.config_exists);
        assert_eq!(status.db_stats.property_count, 1);
        assert_eq!(status.properties.len(), 1);
        assert!(!status.properties[0].index_exists);
    }
}
