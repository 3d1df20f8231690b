//! Indexing and retrieval for one property
//!
//! Building an index chunks every crawled document, embeds the chunks,
//! stores their text in SQLite and their vectors in the property's index
//! file. Retrieval embeds the question and looks the nearest chunk ids up
//! again in SQLite.

use crate::chunk::chunk_page;
use crate::config::ChunkConfig;
use crate::embed::{embed_in_batches, embed_query, Embedder};
use crate::error::{Error, Result};
use crate::index::FlatIndex;
use crate::meta::{MetaDb, NewChunk};
use crate::progress::{finish_progress, start_progress_bar};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extracted text of one page, tagged with the datasource it came from
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub datasource_id: i64,
    pub url: String,
    pub text: String,
}

/// Outcome of an index build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStats {
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
}

/// A chunk returned for a question, closest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk_id: i64,
    pub page_url: String,
    pub text: String,
    pub distance: f32,
}

/// Vector index of one property
pub struct RagIndex {
    property_id: i64,
    index_path: PathBuf,
    embedder: Arc<dyn Embedder>,
    chunk_config: ChunkConfig,
    batch_size: usize,
    show_progress: bool,
    index: Option<FlatIndex>,
}

impl RagIndex {
    pub fn new(property_id: i64, index_path: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            property_id,
            index_path,
            embedder,
            chunk_config: ChunkConfig::default(),
            batch_size: crate::config::default_embedding_batch_size(),
            show_progress: false,
            index: None,
        }
    }

    pub fn with_chunk_config(mut self, chunk_config: ChunkConfig) -> Self {
        self.chunk_config = chunk_config;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Replace the property's chunks and index with ones built from `documents`
    pub async fn build_and_save(
        &mut self,
        db: &MetaDb,
        documents: Vec<SourceDocument>,
    ) -> Result<BuildStats> {
        let document_count = documents.len();

        let mut new_chunks = Vec::new();
        for doc in &documents {
            let chunks = chunk_page(&doc.text, &self.chunk_config);
            debug!("{} -> {} chunks", doc.url, chunks.len());
            new_chunks.extend(chunks.into_iter().map(|c| NewChunk {
                datasource_id: doc.datasource_id,
                page_url: doc.url.clone(),
                chunk_index: c.index as i64,
                chunk_hash: c.hash,
                chunk_text: c.text,
            }));
        }

        if new_chunks.is_empty() {
            return Err(Error::NoContent(format!(
                "no text chunks were produced from {} documents",
                document_count
            )));
        }

        info!(
            "Embedding {} chunks from {} documents",
            new_chunks.len(),
            document_count
        );
        let texts: Vec<String> = new_chunks.iter().map(|c| c.chunk_text.clone()).collect();
        let progress = if self.show_progress {
            start_progress_bar(texts.len(), "Embedding chunks")
        } else {
            None
        };
        let vectors =
            embed_in_batches(self.embedder.as_ref(), texts, self.batch_size, progress.as_ref())
                .await?;
        finish_progress(progress, "Chunks embedded");

        let pending = db
            .replace_property_chunks(self.property_id, &new_chunks)
            .await?;

        let mut index = FlatIndex::new(self.embedder.dimension());
        for (id, vector) in pending.ids.iter().zip(&vectors) {
            index.add(*id, vector)?;
        }

        if let Err(e) = index.save(&self.index_path).await {
            warn!("Writing {} failed, rolling back chunks", self.index_path.display());
            pending.rollback().await?;
            return Err(e);
        }
        pending.commit().await?;

        info!(
            "Index for property {} saved to {}",
            self.property_id,
            self.index_path.display()
        );

        let stats = BuildStats {
            documents: document_count,
            chunks: index.len(),
            dimension: index.dimension(),
        };
        self.index = Some(index);
        Ok(stats)
    }

    /// The `top_k` chunks closest to `query`
    pub async fn retrieve(
        &mut self,
        db: &MetaDb,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        self.load_index().await?;
        let Some(index) = self.index.as_ref() else {
            return Err(Error::IndexNotFound(self.index_path.display().to_string()));
        };

        let query_vector = embed_query(self.embedder.as_ref(), query).await?;
        let neighbors = index.search(&query_vector, top_k)?;

        let ids: Vec<i64> = neighbors.iter().map(|n| n.id).collect();
        let mut rows = db.get_chunks_by_ids(&ids).await?.into_iter().peekable();

        let mut retrieved = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            match rows.peek() {
                Some(row) if row.id == neighbor.id => {
                    if let Some(row) = rows.next() {
                        retrieved.push(RetrievedChunk {
                            chunk_id: row.id,
                            page_url: row.page_url,
                            text: row.chunk_text,
                            distance: neighbor.distance,
                        });
                    }
                }
                _ => warn!("Chunk {} is in the index but not in the database", neighbor.id),
            }
        }

        debug!("Retrieved {} chunks for query", retrieved.len());
        Ok(retrieved)
    }

    async fn load_index(&mut self) -> Result<()> {
        if self.index.is_none() {
            let index = FlatIndex::load(&self.index_path).await?;
            if index.dimension() != self.embedder.dimension() {
                return Err(Error::DimensionMismatch {
                    expected: self.embedder.dimension(),
                    actual: index.dimension(),
                });
            }
            debug!("Loaded {} vectors from {}", index.len(), self.index_path.display());
            self.index = Some(index);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::testing::HashEmbedder;
    use crate::meta::{DatasourceType, NewDatasource};
    use tempfile::TempDir;

    struct Fixture {
        db: MetaDb,
        datasource_id: i64,
        property_id: i64,
        tmp: TempDir,
    }

    async fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::connect(&tmp.path().join("lise.db")).await.unwrap();
        let property = db
            .insert_property("acme", "https://acme.test", "groq")
            .await
            .unwrap();
        let ds = db
            .insert_datasource(&NewDatasource::new(
                property.id,
                DatasourceType::Website,
                "https://acme.test",
            ))
            .await
            .unwrap();
        Fixture {
            db,
            datasource_id: ds.id,
            property_id: property.id,
            tmp,
        }
    }

    fn rag(f: &Fixture) -> RagIndex {
        RagIndex::new(
            f.property_id,
            f.tmp.path().join("indexes").join(format!("{}.index", f.property_id)),
            Arc::new(HashEmbedder::new(256)),
        )
    }

    fn doc(f: &Fixture, url: &str, text: &str) -> SourceDocument {
        SourceDocument {
            datasource_id: f.datasource_id,
            url: url.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_build_then_retrieve() {
        let f = fixture().await;
        let mut index = rag(&f);

        let stats = index
            .build_and_save(
                &f.db,
                vec![
                    doc(&f, "https://acme.test/shipping", "Shipping takes three business days"),
                    doc(&f, "https://acme.test/refunds", "Refunds are issued within thirty days"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(stats.documents, 2);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.dimension, 256);

        // A fresh handle loads the file from disk
        let mut reloaded = rag(&f);
        let hits = reloaded
            .retrieve(&f.db, "Refunds are issued within thirty days", 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].page_url, "https://acme.test/refunds");
        assert!(hits[0].distance < 1e-6);

        let all = reloaded.retrieve(&f.db, "shipping", 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].page_url, "https://acme.test/shipping");
    }

    #[tokio::test]
    async fn test_rebuild_replaces_chunks() {
        let f = fixture().await;
        let mut index = rag(&f);

        index
            .build_and_save(&f.db, vec![doc(&f, "https://acme.test/a", "old text")])
            .await
            .unwrap();
        index
            .build_and_save(&f.db, vec![doc(&f, "https://acme.test/b", "new text")])
            .await
            .unwrap();

        let stats = f.db.property_stats(f.property_id).await.unwrap();
        assert_eq!(stats.chunk_count, 1);

        let hits = index.retrieve(&f.db, "text", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new text");
    }

    #[tokio::test]
    async fn test_empty_documents_change_nothing() {
        let f = fixture().await;
        let mut index = rag(&f);

        index
            .build_and_save(&f.db, vec![doc(&f, "https://acme.test/a", "kept")])
            .await
            .unwrap();

        let err = index
            .build_and_save(&f.db, vec![doc(&f, "https://acme.test/b", "   ")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoContent(_)));

        let hits = rag(&f).retrieve(&f.db, "kept", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "kept");
    }

    #[tokio::test]
    async fn test_failed_index_write_rolls_back() {
        let f = fixture().await;

        // A directory where the index file should go makes the rename fail
        let blocked = f.tmp.path().join("blocked.index");
        std::fs::create_dir_all(blocked.join("child")).unwrap();

        let mut index = RagIndex::new(f.property_id, blocked, Arc::new(HashEmbedder::new(8)));
        let result = index
            .build_and_save(&f.db, vec![doc(&f, "https://acme.test/a", "some text")])
            .await;
        assert!(result.is_err());

        let stats = f.db.property_stats(f.property_id).await.unwrap();
        assert_eq!(stats.chunk_count, 0);
    }

    #[tokio::test]
    async fn test_retrieve_without_index() {
        let f = fixture().await;
        let mut index = rag(&f);

        assert!(index.retrieve(&f.db, "  ", 5).await.unwrap().is_empty());
        assert!(matches!(
            index.retrieve(&f.db, "hello", 5).await,
            Err(Error::IndexNotFound(_))
        ));
    }
}
