//! Question answering over a property's index
//!
//! Each question retrieves the closest chunks, wraps them in a prompt and
//! sends it to the chat model. Earlier turns can be replayed so follow-up
//! questions keep their context.

use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel};
use crate::meta::MetaDb;
use crate::rag::{RagIndex, RetrievedChunk};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// An answer with the pages it was grounded on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    #[serde(rename = "response")]
    pub answer: String,
    pub sources: Vec<String>,
}

/// Build the prompt sent for one question
pub fn build_prompt(context_chunks: &[String], query: &str) -> String {
    format!(
        "Answer the user's question based on the context below.\nContext:\n{}\n\nUser: {}\nAssistant:",
        context_chunks.join("\n\n"),
        query
    )
}

/// Distinct page URLs in retrieval order
pub fn source_urls(chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for chunk in chunks {
        if !urls.contains(&chunk.page_url) {
            urls.push(chunk.page_url.clone());
        }
    }
    urls
}

/// RAG chatbot for one property
pub struct Chatbot {
    rag: RagIndex,
    llm: Arc<dyn ChatModel>,
    top_k: usize,
    history_turns: usize,
    /// Previous (question, answer) pairs, oldest first
    history: VecDeque<(String, String)>,
}

impl Chatbot {
    pub fn new(rag: RagIndex, llm: Arc<dyn ChatModel>, top_k: usize, history_turns: usize) -> Self {
        Self {
            rag,
            llm,
            top_k,
            history_turns,
            history: VecDeque::new(),
        }
    }

    /// Answer one question
    pub async fn generate_reply(&mut self, db: &MetaDb, query: &str) -> Result<Reply> {
        let chunks = self.rag.retrieve(db, query, self.top_k).await?;
        debug!("Using {} context chunks", chunks.len());

        let context: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let prompt = build_prompt(&context, query);

        let mut messages = Vec::with_capacity(self.history.len() * 2 + 1);
        for (question, answer) in &self.history {
            messages.push(ChatMessage::user(question.clone()));
            messages.push(ChatMessage::assistant(answer.clone()));
        }
        messages.push(ChatMessage::user(prompt));

        let answer = self.llm.complete(&messages).await?;

        if self.history_turns > 0 {
            self.history.push_back((query.to_string(), answer.clone()));
            while self.history.len() > self.history_turns {
                self.history.pop_front();
            }
        }

        Ok(Reply {
            answer,
            sources: source_urls(&chunks),
        })
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }
}
