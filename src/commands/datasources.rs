//! Datasource commands: registering sources and (re)building the index

use crate::config::Config;
use crate::crawl::{CrawlRequest, CrawledPage, Crawler};
use crate::embed::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::meta::{
    normalize_website, Datasource, DatasourceStatus, DatasourceType, MetaDb, NewDatasource,
    Property,
};
use crate::progress::{finish_progress, start_progress_bar};
use crate::rag::{BuildStats, RagIndex, SourceDocument};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Options for `datasources add`
#[derive(Debug, Clone)]
pub struct AddDatasourceOptions {
    pub url: String,
    pub source_type: DatasourceType,
    pub mandatory_pages: Vec<String>,
    pub exclude_pages: Vec<String>,
}

/// Pages crawled for one datasource, as kept in the crawl snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasourcePages {
    pub datasource_id: i64,
    pub pages: Vec<CrawledPage>,
}

/// Result of indexing a property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    pub property_id: i64,
    pub property_name: String,
    pub pages: usize,
    pub from_cache: bool,
    pub index_path: String,
    pub stats: BuildStats,
}

/// Add a datasource to a property
pub async fn cmd_add_datasource(
    db: &MetaDb,
    property_key: &str,
    options: AddDatasourceOptions,
) -> Result<Datasource> {
    let property = db.find_property(property_key).await?;

    let url = Url::parse(options.url.trim())
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", options.url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::InvalidUrl(format!(
            "{}: only http and https are supported",
            options.url
        )));
    }

    let mut new = NewDatasource::new(property.id, options.source_type, url.to_string());
    new.mandatory_pages = options.mandatory_pages;
    new.exclude_pages = options.exclude_pages;

    let datasource = db.insert_datasource(&new).await?;
    info!(
        "Added {} datasource {} to '{}'",
        datasource.source_type, datasource.source_uri, property.name
    );
    Ok(datasource)
}

/// List the datasources of a property
pub async fn cmd_list_datasources(db: &MetaDb, property_key: &str) -> Result<Vec<Datasource>> {
    let property = db.find_property(property_key).await?;
    db.list_datasources(property.id).await
}

/// Crawl and index the property registered for `website`
pub async fn cmd_index_website(
    config: &Config,
    db: &MetaDb,
    website: &str,
    from_cache: bool,
) -> Result<IndexReport> {
    let normalized = normalize_website(website)?;
    let property = db
        .get_property_by_website(&normalized)
        .await?
        .ok_or_else(|| Error::PropertyNotFound(normalized.clone()))?;

    let embedder: Arc<dyn Embedder> =
        Arc::from(create_embedder(&config.embedding, &config.models_dir())?);

    index_property(config, db, &property, embedder, from_cache).await
}

/// Crawl (or reload) every datasource of a property and rebuild its index
pub async fn index_property(
    config: &Config,
    db: &MetaDb,
    property: &Property,
    embedder: Arc<dyn Embedder>,
    from_cache: bool,
) -> Result<IndexReport> {
    let snapshot_path = config.pages_path(property.id);

    let snapshot = if from_cache {
        info!("Loading crawled pages from {}", snapshot_path.display());
        let content = match tokio::fs::read_to_string(&snapshot_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NoContent(format!(
                    "no crawl snapshot at {}; index without --from-cache first",
                    snapshot_path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str::<Vec<DatasourcePages>>(&content)?
    } else {
        let datasources = db.list_datasources(property.id).await?;
        let snapshot = match crawl_datasources(config, &datasources).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                db.mark_datasources_indexed(property.id, DatasourceStatus::Failed)
                    .await?;
                return Err(e);
            }
        };

        // Keep the previous snapshot and index when the crawl found nothing
        if snapshot.iter().all(|ds| ds.pages.is_empty()) {
            db.mark_datasources_indexed(property.id, DatasourceStatus::Failed)
                .await?;
            return Err(Error::NoContent(format!(
                "no pages with text were crawled for '{}'",
                property.name
            )));
        }

        write_snapshot(&snapshot_path, &snapshot).await?;
        snapshot
    };

    let documents: Vec<SourceDocument> = snapshot
        .iter()
        .flat_map(|ds| {
            ds.pages.iter().map(move |page| SourceDocument {
                datasource_id: ds.datasource_id,
                url: page.url.clone(),
                text: page.text.clone(),
            })
        })
        .collect();
    let page_count = documents.len();
    info!("Indexing {} pages for '{}'", page_count, property.name);

    let index_path = config.index_path(property.id);
    let mut rag = RagIndex::new(property.id, index_path.clone(), embedder)
        .with_chunk_config(config.chunk.clone())
        .with_batch_size(config.embedding.batch_size)
        .with_progress(true);

    match rag.build_and_save(db, documents).await {
        Ok(stats) => {
            db.mark_datasources_indexed(property.id, DatasourceStatus::Completed)
                .await?;
            Ok(IndexReport {
                property_id: property.id,
                property_name: property.name.clone(),
                pages: page_count,
                from_cache,
                index_path: index_path.display().to_string(),
                stats,
            })
        }
        Err(e) => {
            db.mark_datasources_indexed(property.id, DatasourceStatus::Failed)
                .await?;
            Err(e)
        }
    }
}

/// Write the crawl snapshot through a temp file so a failed write keeps the old one
async fn write_snapshot(path: &Path, snapshot: &[DatasourcePages]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, serde_json::to_vec_pretty(snapshot)?).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    debug!("Saved crawl snapshot to {}", path.display());
    Ok(())
}

async fn crawl_datasources(
    config: &Config,
    datasources: &[Datasource],
) -> Result<Vec<DatasourcePages>> {
    let crawler = Crawler::new(config.crawl.clone())?;
    let mut snapshot = Vec::with_capacity(datasources.len());

    for datasource in datasources {
        let pages = match datasource.get_type()? {
            DatasourceType::Website => {
                let request = CrawlRequest {
                    base_url: datasource.source_uri.clone(),
                    mandatory_pages: datasource.mandatory_pages(),
                    exclude_pages: datasource.exclude_pages(),
                    follow_links: true,
                };
                info!("Crawling {}", request.base_url);
                let progress =
                    start_progress_bar(config.crawl.max_pages as usize, "Crawling pages");
                let pages = crawler.crawl(&request, progress.as_ref()).await?;
                finish_progress(progress, "Crawl finished");
                pages
            }
            DatasourceType::Page => match crawler.fetch(&datasource.source_uri).await {
                Ok(page) if !page.text.trim().is_empty() => vec![page],
                Ok(_) => {
                    warn!("No text extracted from {}", datasource.source_uri);
                    Vec::new()
                }
                Err(e) => {
                    warn!("Failed to fetch {}: {}", datasource.source_uri, e);
                    Vec::new()
                }
            },
        };

        info!("{} pages from {}", pages.len(), datasource.source_uri);
        snapshot.push(DatasourcePages {
            datasource_id: datasource.id,
            pages,
        });
    }

    Ok(snapshot)
}

pub fn print_datasources(datasources: &[Datasource]) {
    if datasources.is_empty() {
        println!("No datasources. Use 'lise datasources add' to add one.");
        return;
    }

    for ds in datasources {
        println!("• [{}] {} ({})", ds.id, ds.source_uri, ds.source_type);
        let status = match ds.get_status() {
            Ok(DatasourceStatus::Completed) => "✓ completed",
            Ok(DatasourceStatus::Failed) => "✗ failed",
            Ok(DatasourceStatus::Pending) => "… pending",
            Err(_) => ds.status.as_str(),
        };
        println!("  Status: {}", status);
        let mandatory = ds.mandatory_pages();
        if !mandatory.is_empty() {
            println!("  Always include: {}", mandatory.join(", "));
        }
        let exclude = ds.exclude_pages();
        if !exclude.is_empty() {
            println!("  Exclude: {}", exclude.join(", "));
        }
        if let Some(at) = &ds.last_indexed_at {
            println!("  Last indexed: {}", at);
        }
    }
}

pub fn print_index_report(report: &IndexReport) {
    println!("\n✓ Index built for '{}'", report.property_name);
    println!(
        "  Pages: {}{}",
        report.pages,
        if report.from_cache { " (from cache)" } else { "" }
    );
    println!("  Chunks: {}", report.stats.chunks);
    println!("  Dimension: {}", report.stats.dimension);
    println!("  Index: {}", report.index_path);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::HashEmbedder;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (Config, MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.crawl.rate_limit_per_host = 1000.0;
        config.ensure_dirs().unwrap();
        let db = MetaDb::connect(&config.paths.db_file).await.unwrap();
        (config, db, tmp)
    }

    async fn site() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><body><p>Welcome to Acme</p><a href="/faq">FAQ</a></body></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/faq"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><body><p>Returns are free</p></body></html>",
                "text/html",
            ))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_add_datasource_validates_url() {
        let (_config, db, _tmp) = setup().await;
        db.insert_property("acme", "https://acme.test", "groq")
            .await
            .unwrap();

        let bad = cmd_add_datasource(
            &db,
            "acme",
            AddDatasourceOptions {
                url: "ftp://acme.test/file".to_string(),
                source_type: DatasourceType::Page,
                mandatory_pages: Vec::new(),
                exclude_pages: Vec::new(),
            },
        )
        .await;
        assert!(matches!(bad, Err(Error::InvalidUrl(_))));

        let ok = cmd_add_datasource(
            &db,
            "acme",
            AddDatasourceOptions {
                url: "https://acme.test/terms".to_string(),
                source_type: DatasourceType::Page,
                mandatory_pages: Vec::new(),
                exclude_pages: vec!["/old".to_string()],
            },
        )
        .await
        .unwrap();
        assert_eq!(ok.exclude_pages(), vec!["/old".to_string()]);
        assert_eq!(cmd_list_datasources(&db, "acme").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_index_crawls_then_reuses_cache() {
        let (config, db, _tmp) = setup().await;
        let server = site().await;

        let property = db
            .insert_property("acme", &server.uri(), "groq")
            .await
            .unwrap();
        db.insert_datasource(&NewDatasource::new(
            property.id,
            DatasourceType::Website,
            server.uri(),
        ))
        .await
        .unwrap();

        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(32));
        let report = index_property(&config, &db, &property, embedder.clone(), false)
            .await
            .unwrap();
        assert_eq!(report.pages, 2);
        assert_eq!(report.stats.chunks, 2);
        assert!(config.index_path(property.id).exists());
        assert!(config.pages_path(property.id).exists());

        let datasources = db.list_datasources(property.id).await.unwrap();
        assert_eq!(
            datasources[0].get_status().unwrap(),
            DatasourceStatus::Completed
        );

        // The site going away does not matter when indexing from the snapshot
        drop(server);
        let cached = index_property(&config, &db, &property, embedder, true)
            .await
            .unwrap();
        assert!(cached.from_cache);
        assert_eq!(cached.stats.chunks, 2);
    }

    #[tokio::test]
    async fn test_empty_crawl_marks_failed() {
        let (config, db, _tmp) = setup().await;
        let server = MockServer::start().await; // every path is a 404

        let property = db
            .insert_property("ghost", &server.uri(), "groq")
            .await
            .unwrap();
        db.insert_datasource(&NewDatasource::new(
            property.id,
            DatasourceType::Website,
            server.uri(),
        ))
        .await
        .unwrap();

        let err = index_property(&config, &db, &property, Arc::new(HashEmbedder::new(8)), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoContent(_)));

        let datasources = db.list_datasources(property.id).await.unwrap();
        assert_eq!(datasources[0].get_status().unwrap(), DatasourceStatus::Failed);
        assert!(!config.index_path(property.id).exists());
        assert!(!config.pages_path(property.id).exists());
    }

    #[tokio::test]
    async fn test_empty_recrawl_keeps_previous_snapshot() {
        let (config, db, _tmp) = setup().await;
        let server = site().await;

        let property = db
            .insert_property("acme", &server.uri(), "groq")
            .await
            .unwrap();
        db.insert_datasource(&NewDatasource::new(
            property.id,
            DatasourceType::Website,
            server.uri(),
        ))
        .await
        .unwrap();

        let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(32));
        index_property(&config, &db, &property, embedder.clone(), false)
            .await
            .unwrap();
        let snapshot_path = config.pages_path(property.id);
        let before = std::fs::read_to_string(&snapshot_path).unwrap();

        // Every page now answers 404
        server.reset().await;
        let err = index_property(&config, &db, &property, embedder.clone(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoContent(_)));
        assert_eq!(std::fs::read_to_string(&snapshot_path).unwrap(), before);

        let datasources = db.list_datasources(property.id).await.unwrap();
        assert_eq!(datasources[0].get_status().unwrap(), DatasourceStatus::Failed);

        let cached = index_property(&config, &db, &property, embedder, true)
            .await
            .unwrap();
        assert_eq!(cached.pages, 2);
        assert_eq!(cached.stats.chunks, 2);
    }

    #[tokio::test]
    async fn test_crawl_error_marks_failed() {
        let (config, db, _tmp) = setup().await;
        let property = db
            .insert_property("broken", "https://broken.test", "groq")
            .await
            .unwrap();
        db.insert_datasource(&NewDatasource::new(
            property.id,
            DatasourceType::Website,
            "not a url",
        ))
        .await
        .unwrap();

        let result =
            index_property(&config, &db, &property, Arc::new(HashEmbedder::new(8)), false).await;
        assert!(result.is_err());

        let datasources = db.list_datasources(property.id).await.unwrap();
        assert_eq!(datasources[0].get_status().unwrap(), DatasourceStatus::Failed);
        assert!(!config.pages_path(property.id).exists());
    }

    #[tokio::test]
    async fn test_index_unknown_website() {
        let (config, db, _tmp) = setup().await;
        let err = cmd_index_website(&config, &db, "nowhere.test", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PropertyNotFound(_)));
    }
}
