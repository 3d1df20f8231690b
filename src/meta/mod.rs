//! Metadata storage using SQLite
//!
//! This module handles all local metadata storage including:
//! - Properties (websites registered for chat)
//! - Datasources (what gets crawled for a property)
//! - Chunks (text passages referenced by the vector index)

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use url::Url;

/// Datasource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceType {
    /// Crawl the site from this URL
    Website,
    /// Fetch this single page
    Page,
}

impl std::fmt::Display for DatasourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasourceType::Website => write!(f, "website"),
            DatasourceType::Page => write!(f, "page"),
        }
    }
}

impl FromStr for DatasourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "website" => Ok(DatasourceType::Website),
            "page" => Ok(DatasourceType::Page),
            _ => Err(Error::Config(format!("Unknown datasource type: {}", s))),
        }
    }
}

/// Datasource indexing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for DatasourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasourceStatus::Pending => write!(f, "pending"),
            DatasourceStatus::Completed => write!(f, "completed"),
            DatasourceStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DatasourceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DatasourceStatus::Pending),
            "completed" => Ok(DatasourceStatus::Completed),
            "failed" => Ok(DatasourceStatus::Failed),
            _ => Err(Error::Config(format!("Unknown datasource status: {}", s))),
        }
    }
}

/// A website registered for chat
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    pub name: String,
    pub website: String,
    pub platform_name: String,
    pub created_at: String,
}

/// A crawlable source of a property
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Datasource {
    pub id: i64,
    pub property_id: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub source_type: String,
    pub source_uri: String,
    pub mandatory_pages_json: Option<String>,
    pub exclude_pages_json: Option<String>,
    pub status: String,
    pub last_indexed_at: Option<String>,
    pub created_at: String,
}

impl Datasource {
    pub fn get_type(&self) -> Result<DatasourceType> {
        self.source_type.parse()
    }

    pub fn get_status(&self) -> Result<DatasourceStatus> {
        self.status.parse()
    }

    pub fn mandatory_pages(&self) -> Vec<String> {
        decode_list(self.mandatory_pages_json.as_deref())
    }

    pub fn exclude_pages(&self) -> Vec<String> {
        decode_list(self.exclude_pages_json.as_deref())
    }
}

/// Fields of a datasource to insert
#[derive(Debug, Clone)]
pub struct NewDatasource {
    pub property_id: i64,
    pub source_type: DatasourceType,
    pub source_uri: String,
    pub mandatory_pages: Vec<String>,
    pub exclude_pages: Vec<String>,
}

impl NewDatasource {
    pub fn new(property_id: i64, source_type: DatasourceType, source_uri: impl Into<String>) -> Self {
        Self {
            property_id,
            source_type,
            source_uri: source_uri.into(),
            mandatory_pages: Vec::new(),
            exclude_pages: Vec::new(),
        }
    }
}

/// A stored text chunk
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: i64,
    pub datasource_id: i64,
    pub page_url: String,
    pub chunk_index: i64,
    pub chunk_hash: String,
    pub chunk_text: String,
}

/// A chunk waiting to be inserted
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub datasource_id: i64,
    pub page_url: String,
    pub chunk_index: i64,
    pub chunk_hash: String,
    pub chunk_text: String,
}

/// Chunks inserted inside an open transaction.
///
/// Nothing is visible to other connections until `commit`; dropping the
/// value rolls the replacement back.
pub struct PendingChunks {
    tx: Transaction<'static, Sqlite>,
    /// Row ids of the inserted chunks, in input order
    pub ids: Vec<i64>,
}

impl PendingChunks {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Statistics for a single property
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyStats {
    pub datasource_count: usize,
    pub page_count: usize,
    pub chunk_count: usize,
}

/// Global statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalStats {
    pub property_count: usize,
    pub datasource_count: usize,
    pub chunk_count: usize,
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Open (creating if needed) the metadata database and apply the schema
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Create tables and indexes that do not exist yet
    pub async fn init_schema(&self) -> Result<()> {
        debug!("Applying database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    // ===== Property Operations =====

    /// Insert a property; name and website must both be unused
    pub async fn insert_property(
        &self,
        name: &str,
        website: &str,
        platform_name: &str,
    ) -> Result<Property> {
        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO properties (name, website, platform_name, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(website)
        .bind(platform_name)
        .bind(&created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                info!("Created property '{}' for {}", name, website);
                Ok(Property {
                    id: done.last_insert_rowid(),
                    name: name.to_string(),
                    website: website.to_string(),
                    platform_name: platform_name.to_string(),
                    created_at,
                })
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(Error::PropertyExists(format!("{} ({})", name, website)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get property by ID
    pub async fn get_property(&self, id: i64) -> Result<Option<Property>> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    /// Get property by name (case-sensitive match)
    pub async fn get_property_by_name(&self, name: &str) -> Result<Option<Property>> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    /// Get property by its normalized website
    pub async fn get_property_by_website(&self, website: &str) -> Result<Option<Property>> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE website = ?")
            .bind(website)
            .fetch_optional(&self.pool)
            .await?;
        Ok(property)
    }

    /// Resolve a property from a numeric id or a name
    pub async fn find_property(&self, key: &str) -> Result<Property> {
        if let Ok(id) = key.parse::<i64>() {
            if let Some(property) = self.get_property(id).await? {
                return Ok(property);
            }
        }
        self.get_property_by_name(key)
            .await?
            .ok_or_else(|| Error::PropertyNotFound(key.to_string()))
    }

    /// List all properties
    pub async fn list_properties(&self) -> Result<Vec<Property>> {
        let properties = sqlx::query_as::<_, Property>("SELECT * FROM properties ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(properties)
    }

    /// Delete a property with its datasources and chunks
    pub async fn delete_property(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM properties WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Datasource Operations =====

    /// Insert a datasource in `pending` state
    pub async fn insert_datasource(&self, new: &NewDatasource) -> Result<Datasource> {
        let created_at = Utc::now().to_rfc3339();
        let mandatory = encode_list(&new.mandatory_pages)?;
        let exclude = encode_list(&new.exclude_pages)?;

        let result = sqlx::query(
            r#"
            INSERT INTO datasources
                (property_id, type, source_uri, mandatory_pages_json, exclude_pages_json, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.property_id)
        .bind(new.source_type.to_string())
        .bind(&new.source_uri)
        .bind(&mandatory)
        .bind(&exclude)
        .bind(DatasourceStatus::Pending.to_string())
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(Datasource {
            id: result.last_insert_rowid(),
            property_id: new.property_id,
            source_type: new.source_type.to_string(),
            source_uri: new.source_uri.clone(),
            mandatory_pages_json: mandatory,
            exclude_pages_json: exclude,
            status: DatasourceStatus::Pending.to_string(),
            last_indexed_at: None,
            created_at,
        })
    }

    /// List datasources of a property
    pub async fn list_datasources(&self, property_id: i64) -> Result<Vec<Datasource>> {
        let datasources = sqlx::query_as::<_, Datasource>(
            "SELECT * FROM datasources WHERE property_id = ? ORDER BY id",
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(datasources)
    }

    /// Record the outcome of indexing for every datasource of a property
    pub async fn mark_datasources_indexed(
        &self,
        property_id: i64,
        status: DatasourceStatus,
    ) -> Result<()> {
        let indexed_at = match status {
            DatasourceStatus::Completed => Some(Utc::now().to_rfc3339()),
            _ => None,
        };

        sqlx::query(
            r#"
            UPDATE datasources
            SET status = ?, last_indexed_at = COALESCE(?, last_indexed_at)
            WHERE property_id = ?
            "#,
        )
        .bind(status.to_string())
        .bind(indexed_at)
        .bind(property_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ===== Chunk Operations =====

    /// Delete the property's chunks and insert `chunks` in one transaction.
    ///
    /// The transaction stays open so the caller can write the vector index
    /// before committing.
    pub async fn replace_property_chunks(
        &self,
        property_id: i64,
        chunks: &[NewChunk],
    ) -> Result<PendingChunks> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM chunks WHERE datasource_id IN (SELECT id FROM datasources WHERE property_id = ?)",
        )
        .bind(property_id)
        .execute(&mut *tx)
        .await?;
        debug!("Deleted {} old chunks", deleted.rows_affected());

        let mut ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let result = sqlx::query(
                r#"
                INSERT INTO chunks (datasource_id, page_url, chunk_index, chunk_hash, chunk_text)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk.datasource_id)
            .bind(&chunk.page_url)
            .bind(chunk.chunk_index)
            .bind(&chunk.chunk_hash)
            .bind(&chunk.chunk_text)
            .execute(&mut *tx)
            .await?;
            ids.push(result.last_insert_rowid());
        }

        Ok(PendingChunks { tx, ids })
    }

    /// Fetch chunks by id, in the order of `ids`; unknown ids are skipped
    pub async fn get_chunks_by_ids(&self, ids: &[i64]) -> Result<Vec<ChunkRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT * FROM chunks WHERE id IN ({})", placeholders);

        let mut query = sqlx::query_as::<_, ChunkRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut by_id: HashMap<i64, ChunkRow> = rows.into_iter().map(|r| (r.id, r)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    // ===== Statistics =====

    /// Get property statistics
    pub async fn property_stats(&self, property_id: i64) -> Result<PropertyStats> {
        let datasource_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM datasources WHERE property_id = ?")
                .bind(property_id)
                .fetch_one(&self.pool)
                .await?;

        let (chunk_count, page_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT c.page_url) FROM chunks c
            JOIN datasources d ON c.datasource_id = d.id
            WHERE d.property_id = ?
            "#,
        )
        .bind(property_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(PropertyStats {
            datasource_count: datasource_count as usize,
            page_count: page_count as usize,
            chunk_count: chunk_count as usize,
        })
    }

    /// Get global statistics
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let property_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM properties")
            .fetch_one(&self.pool)
            .await?;

        let datasource_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM datasources")
            .fetch_one(&self.pool)
            .await?;

        let chunk_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            property_count: property_count as usize,
            datasource_count: datasource_count as usize,
            chunk_count: chunk_count as usize,
        })
    }
}

/// Reduce a website URL to `scheme://host[:port]`.
///
/// A missing scheme defaults to `https`; path, query and fragment are dropped.
pub fn normalize_website(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidUrl("empty website".to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme)
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", input, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::InvalidUrl(format!("{}: only http and https are supported", input)));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::InvalidUrl(format!("{}: missing host", input)))?
        .to_lowercase();

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

fn encode_list(items: &[String]) -> Result<Option<String>> {
    if items.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(items)?))
    }
}

fn decode_list(json: Option<&str>) -> Vec<String> {
    json.and_then(|j| serde_json::from_str(j).ok())
        .unwrap_or_default()
}
