//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Pagefeed URL store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per URL ever admitted
CREATE TABLE IF NOT EXISTS urls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    path TEXT NOT NULL,
    query_string TEXT NOT NULL DEFAULT '',
    file_type TEXT NOT NULL DEFAULT 'html',
    first_seen INTEGER NOT NULL,
    last_crawled INTEGER,
    crawl_count INTEGER NOT NULL DEFAULT 0,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'pending',
    source_url TEXT NOT NULL DEFAULT '',
    blocked INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_urls_url ON urls(url);
CREATE INDEX IF NOT EXISTS idx_urls_domain ON urls(domain);
CREATE INDEX IF NOT EXISTS idx_urls_status ON urls(status);
CREATE INDEX IF NOT EXISTS idx_urls_priority ON urls(priority DESC);
CREATE INDEX IF NOT EXISTS idx_urls_last_crawled ON urls(last_crawled);
CREATE INDEX IF NOT EXISTS idx_urls_blocked ON urls(blocked);
"#;

/// Creates the table and indexes if they are missing
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
