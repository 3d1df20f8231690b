//! One-shot question answering

use crate::chat::{Chatbot, Reply};
use crate::config::Config;
use crate::embed::{create_embedder, Embedder};
use crate::error::{Error, Result};
use crate::llm::{ChatModel, OpenAiCompatClient, Platform};
use crate::meta::{MetaDb, Property};
use crate::rag::RagIndex;
use std::sync::Arc;
use tracing::{debug, info};

/// Set up a chatbot for a property: model client, index and embedder
pub fn open_chatbot(config: &Config, property: &Property, top_k: usize) -> Result<Chatbot> {
    let platform: Platform = property.platform_name.parse()?;
    let llm: Arc<dyn ChatModel> = Arc::new(OpenAiCompatClient::for_platform(platform, &config.llm)?);

    // Fail before loading the embedding model when there is nothing to search
    let index_path = config.index_path(property.id);
    if !index_path.exists() {
        return Err(Error::IndexNotFound(index_path.display().to_string()));
    }

    let embedder: Arc<dyn Embedder> =
        Arc::from(create_embedder(&config.embedding, &config.models_dir())?);
    let rag = RagIndex::new(property.id, index_path, embedder);

    debug!("Chatbot for '{}' uses {}", property.name, llm.model_name());
    Ok(Chatbot::new(rag, llm, top_k, config.llm.history_turns))
}

/// Answer a single question about a property
pub async fn cmd_ask(
    config: &Config,
    db: &MetaDb,
    property_key: &str,
    query: &str,
    top_k: Option<usize>,
) -> Result<Reply> {
    let property = db.find_property(property_key).await?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    if top_k == 0 {
        return Err(Error::Config("--top-k must be positive".to_string()));
    }

    info!("Answering question for '{}'", property.name);
    let mut chatbot = open_chatbot(config, &property, top_k)?;
    chatbot.generate_reply(db, query).await
}

pub fn print_reply(reply: &Reply) {
    println!("{}", reply.answer.trim());
    if !reply.sources.is_empty() {
        println!("\nSources:");
        for url in &reply.sources {
            println!("  • {}", url);
        }
    }
}

/// Message shown for a failed answer, keeping throttling apart from other errors
pub fn describe_failure(error: &Error) -> String {
    if error.is_rate_limited() {
        "The model provider is rate limiting requests; try again shortly.".to_string()
    } else {
        format!("Could not answer: {}", error)
    }
}
