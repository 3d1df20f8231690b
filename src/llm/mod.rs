//! Hosted chat-completion models
//!
//! A `ChatModel` turns a conversation into the assistant's next message.
//! The only backend is an OpenAI-compatible HTTP client, which covers both
//! Groq and OpenAI.

mod openai_compat;

pub use openai_compat::*;

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for chat-completion providers
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the assistant reply to `messages`
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Hosted LLM platforms a property can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Groq,
    OpenAi,
}

impl Platform {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Platform::Groq => "https://api.groq.com/openai/v1",
            Platform::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Platform::Groq => "llama3-8b-8192",
            Platform::OpenAi => "gpt-4o-mini",
        }
    }

    /// Environment variable holding the platform API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Platform::Groq => "GROQ_API_KEY",
            Platform::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Groq => write!(f, "groq"),
            Platform::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(Platform::Groq),
            "openai" => Ok(Platform::OpenAi),
            _ => Err(Error::Config(format!(
                "Unknown platform: {} (expected groq or openai)",
                s
            ))),
        }
    }
}
