//! lise: chat with a website
//!
//! Crawl a site, index its text locally and answer questions about it
//! with a hosted chat model (retrieval-augmented generation).

pub mod chat;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod crawl;
pub mod embed;
pub mod error;
pub mod index;
pub mod llm;
pub mod meta;
pub mod parse;
pub mod progress;
pub mod rag;

pub use error::{Error, Result};
