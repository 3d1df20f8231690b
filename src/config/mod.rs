//! Configuration management for lise
//!
//! Handles loading, saving, and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Embedding model configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Web crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Completion endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension (must match model)
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Batch size for embedding
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,

    /// Where downloaded model files are cached (defaults to <base>/models)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk, before overlap is prepended
    #[serde(default = "default_chunk_size")]
    pub size: usize,

    /// Characters carried over from the previous chunk
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

/// Web crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum pages fetched successfully per datasource
    #[serde(default = "default_crawl_max_pages")]
    pub max_pages: u32,

    /// Maximum link depth from the base URL
    #[serde(default = "default_crawl_max_depth")]
    pub max_depth: u32,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// Requests per second per host
    #[serde(default = "default_crawl_rate_limit")]
    pub rate_limit_per_host: f64,

    /// User agent string
    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,

    /// Whether to respect robots.txt
    #[serde(default = "default_respect_robots")]
    pub respect_robots_txt: bool,

    /// Path substrings never crawled, for every datasource
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks forwarded to the model per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Platform used when a property does not name one
    #[serde(default = "default_llm_platform")]
    pub platform: String,

    /// Model override (platform default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL override, e.g. a self-hosted OpenAI-compatible server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Previous question/answer pairs replayed in `chat` (0 = stateless)
    #[serde(default)]
    pub history_turns: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for lise data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,

    /// Directory holding one vector index file per property
    pub index_dir: PathBuf,

    /// Directory holding crawl snapshots
    pub pages_dir: PathBuf,
}

impl PathsConfig {
    fn under(base: PathBuf, config_file: PathBuf) -> Self {
        Self {
            config_file,
            db_file: base.join("lise.db"),
            index_dir: base.join("indexes"),
            pages_dir: base.join("pages"),
            base_dir: base,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_embedding_batch_size(),
            cache_dir: None,
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: default_crawl_max_pages(),
            max_depth: default_crawl_max_depth(),
            timeout_secs: default_crawl_timeout(),
            rate_limit_per_host: default_crawl_rate_limit(),
            user_agent: default_crawl_user_agent(),
            respect_robots_txt: default_respect_robots(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            platform: default_llm_platform(),
            model: None,
            base_url: None,
            timeout_secs: default_llm_timeout(),
            max_tokens: None,
            temperature: None,
            history_turns: 0,
        }
    }
}

impl Config {
    /// Get the default base directory for lise ($LISE_HOME or ~/.lise)
    pub fn default_base_dir() -> PathBuf {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".lise")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Split a `--config` argument into base directory and config file.
    ///
    /// A path ending in `.toml` names the file itself; anything else is a
    /// base directory holding `config.toml`.
    pub fn resolve_paths(config: Option<&Path>) -> (PathBuf, PathBuf) {
        match config {
            Some(path) if is_config_file(path) => {
                let base = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (base, path.to_path_buf())
            }
            Some(dir) => (dir.to_path_buf(), dir.join("config.toml")),
            None => (Self::default_base_dir(), Self::default_config_path()),
        }
    }

    /// Load the configuration a `--config` argument points at
    pub fn open(config: Option<&Path>) -> Result<Self> {
        match config {
            Some(path) if is_config_file(path) => Self::load(path),
            Some(dir) => Self::load_from(Some(dir.to_path_buf())),
            None => Self::load_from(None),
        }
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig::under(base.clone(), base.join("config.toml"));
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        config.paths = PathsConfig::under(base, config_path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Create the data directories under the base directory
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.paths.base_dir)?;
        std::fs::create_dir_all(&self.paths.index_dir)?;
        std::fs::create_dir_all(&self.paths.pages_dir)?;
        Ok(())
    }

    /// Vector index file of a property
    pub fn index_path(&self, property_id: i64) -> PathBuf {
        self.paths.index_dir.join(format!("{}.index", property_id))
    }

    /// Crawl snapshot file of a property
    pub fn pages_path(&self, property_id: i64) -> PathBuf {
        self.paths.pages_dir.join(format!("{}.json", property_id))
    }

    /// Model cache directory
    pub fn models_dir(&self) -> PathBuf {
        self.embedding
            .cache_dir
            .clone()
            .unwrap_or_else(|| self.paths.base_dir.join("models"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk.size == 0 {
            return Err(Error::Config("chunk.size must be positive".to_string()));
        }

        if self.chunk.overlap >= self.chunk.size {
            return Err(Error::Config(
                "chunk.overlap must be < chunk.size".to_string(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(Error::Config(
                "embedding.dimension must be positive".to_string(),
            ));
        }

        if self.embedding.batch_size == 0 {
            return Err(Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(Error::Config(
                "retrieval.top_k must be positive".to_string(),
            ));
        }

        if self.crawl.max_pages == 0 {
            return Err(Error::Config(
                "crawl.max_pages must be positive".to_string(),
            ));
        }

        if self.crawl.rate_limit_per_host <= 0.0 {
            return Err(Error::Config(
                "crawl.rate_limit_per_host must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_config_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "toml")
}

/// Load `.env` from the working directory and, when given, from the base
/// directory. Variables already set in the environment win.
pub fn load_env_files(base_dir: Option<&Path>) {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {:?}", path);
    }
    if let Some(base_dir) = base_dir {
        let local = base_dir.join(".env");
        if local.exists() {
            if let Err(e) = dotenvy::from_path(&local) {
                warn!("Could not read {}: {}", local.display(), e);
            }
        }
    }
}
