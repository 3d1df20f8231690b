//! SQLite schema definition

/// SQL schema for the metadata database
pub const SCHEMA_SQL: &str = r#"
-- Properties: websites registered for chat
CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    website TEXT NOT NULL UNIQUE,
    platform_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Datasources: crawlable sources of a property
CREATE TABLE IF NOT EXISTS datasources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    property_id INTEGER NOT NULL REFERENCES properties(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    source_uri TEXT NOT NULL,
    mandatory_pages_json TEXT,
    exclude_pages_json TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    last_indexed_at TEXT,
    created_at TEXT NOT NULL
);

-- Chunks: passages of extracted page text; ids are stored in the vector index
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    datasource_id INTEGER NOT NULL REFERENCES datasources(id) ON DELETE CASCADE,
    page_url TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    chunk_hash TEXT NOT NULL,
    chunk_text TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_datasources_property ON datasources(property_id);
CREATE INDEX IF NOT EXISTS idx_chunks_datasource ON chunks(datasource_id);
CREATE INDEX IF NOT EXISTS idx_chunks_hash ON chunks(chunk_hash);
"#;
