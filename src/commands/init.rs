//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Where `init` put things
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitInfo {
    pub base_dir: String,
    pub config_path: String,
    pub db_path: String,
}

/// Write a default config, create the data directories and the database
pub async fn cmd_init(base_dir: PathBuf, config_path: PathBuf, force: bool) -> Result<InitInfo> {
    if config_path.exists() && !force {
        return Err(Error::AlreadyInitialized(config_path.display().to_string()));
    }

    let mut config = Config::default();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;

    config.validate()?;
    config.ensure_dirs()?;
    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    MetaDb::connect(&config.paths.db_file).await?;
    info!("Created database at {:?}", config.paths.db_file);

    Ok(InitInfo {
        base_dir: config.paths.base_dir.display().to_string(),
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
    })
}

pub fn print_init(info: &InitInfo) {
    println!("✓ lise initialized");
    println!("  Config: {}", info.config_path);
    println!("  Database: {}", info.db_path);
    println!("\nNext steps:");
    println!("  1. Put GROQ_API_KEY (or OPENAI_API_KEY) in {}/.env", info.base_dir);
    println!("  2. lise properties create <name> --website <url>");
    println!("  3. lise datasources index --website <url>");
    println!("  4. lise chat <name>");
}
