//! Default values for configuration

/// Environment variable that relocates the lise base directory
pub const HOME_ENV: &str = "LISE_HOME";

/// Default embedding model (sentence-transformers/all-MiniLM-L6-v2)
pub fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

/// Default embedding dimension for all-MiniLM-L6-v2
pub fn default_embedding_dimension() -> usize {
    384
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default maximum characters per chunk
pub fn default_chunk_size() -> usize {
    500
}

/// Default overlap characters between chunks
pub fn default_chunk_overlap() -> usize {
    100
}

/// Default maximum pages per crawl
pub fn default_crawl_max_pages() -> u32 {
    10
}

/// Default maximum crawl depth
pub fn default_crawl_max_depth() -> u32 {
    3
}

/// Default request timeout in seconds
pub fn default_crawl_timeout() -> u64 {
    5
}

/// Default rate limit (requests per second per host)
pub fn default_crawl_rate_limit() -> f64 {
    2.0
}

/// Default user agent
pub fn default_crawl_user_agent() -> String {
    format!("lise/{} (Website Chatbot Indexer)", env!("CARGO_PKG_VERSION"))
}

/// Default: respect robots.txt
pub fn default_respect_robots() -> bool {
    true
}

/// Default number of chunks retrieved per question
pub fn default_top_k() -> usize {
    5
}

/// Default LLM platform
pub fn default_llm_platform() -> String {
    "groq".to_string()
}

/// Default completion request timeout in seconds
pub fn default_llm_timeout() -> u64 {
    60
}
