//! Embedding generation
//!
//! This module provides an abstraction over embedding models with:
//! - A trait for different embedding backends
//! - Local embedding support via fastembed
//! - Batch processing with dimension checks

#[cfg(feature = "local-embed")]
mod fastembed_impl;

#[cfg(feature = "local-embed")]
pub use fastembed_impl::*;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::path::Path;
use tracing::debug;

/// Trait for embedding providers
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig, cache_dir: &Path) -> Result<Box<dyn Embedder>> {
    #[cfg(feature = "local-embed")]
    {
        let embedder = FastEmbedder::new(config, cache_dir)?;
        Ok(Box::new(embedder))
    }

    #[cfg(not(feature = "local-embed"))]
    {
        let _ = (config, cache_dir);
        Err(Error::Embedding(
            "No embedding backend available. Enable 'local-embed' feature.".to_string(),
        ))
    }
}

/// Embed texts in batches, checking every vector's dimension
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: Vec<String>,
    batch_size: usize,
    progress: Option<&ProgressBar>,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let expected = embedder.dimension();
    let mut all_embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size) {
        let batch_texts: Vec<String> = chunk.to_vec();
        let embeddings = embedder.embed(batch_texts).await?;

        if embeddings.len() != chunk.len() {
            return Err(Error::Embedding(format!(
                "Model returned {} vectors for {} texts",
                embeddings.len(),
                chunk.len()
            )));
        }
        for vector in &embeddings {
            check_dimension(vector, expected)?;
        }

        debug!("Embedded batch of {}", chunk.len());
        if let Some(pb) = progress {
            pb.inc(chunk.len() as u64);
        }
        all_embeddings.extend(embeddings);
    }

    Ok(all_embeddings)
}

/// Embed a single query text
pub async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(vec![query.to_string()]).await?;
    let vector = vectors
        .pop()
        .ok_or_else(|| Error::Embedding("Model returned no vector for query".to_string()))?;
    check_dimension(&vector, embedder.dimension())?;
    Ok(vector)
}

fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
