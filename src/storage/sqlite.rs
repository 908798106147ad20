//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the UrlStore trait.

use crate::state::{DomainStats, UrlStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, UrlStore};
use crate::storage::{AddResult, UrlQuery, UrlRecord};
use crate::url::split_url;
use crate::PagefeedError;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const RECORD_COLUMNS: &str = "id, url, domain, path, query_string, file_type, first_seen, \
     last_crawled, crawl_count, priority, status, source_url, blocked";

/// SQLite URL store
pub struct SqliteUrlStore {
    conn: Connection,
}

impl SqliteUrlStore {
    /// Creates a new SqliteUrlStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteUrlStore)` - Successfully opened/created database
    /// * `Err(PagefeedError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, PagefeedError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, PagefeedError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Runs a single-row status update and reports a missing id
    fn update_one(&mut self, sql: &str, id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(sql, params![id])?;
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    fn count_where(&self, condition: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM urls WHERE {}", condition),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_where(&self, condition: &str, value: Value) -> StorageResult<Option<UrlRecord>> {
        let sql = format!("SELECT {} FROM urls WHERE {}", RECORD_COLUMNS, condition);
        let record = self
            .conn
            .query_row(&sql, params![value], row_to_record)
            .optional()?;
        Ok(record)
    }
}

/// Maps a row selected with `RECORD_COLUMNS` to a record
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<UrlRecord> {
    Ok(UrlRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        domain: row.get(2)?,
        path: row.get(3)?,
        query_string: row.get(4)?,
        file_type: row.get(5)?,
        first_seen: row.get(6)?,
        last_crawled: row.get(7)?,
        crawl_count: row.get::<_, i64>(8)? as u64,
        priority: row.get(9)?,
        status: UrlStatus::from_db_string(&row.get::<_, String>(10)?)
            .unwrap_or(UrlStatus::Pending),
        source_url: row.get(11)?,
        blocked: row.get::<_, i64>(12)? != 0,
    })
}

impl UrlStore for SqliteUrlStore {
    // ===== Admission =====

    fn add(&mut self, url: &str, source_url: &str) -> StorageResult<AddResult> {
        let parts = split_url(url);
        let now = Utc::now().timestamp();

        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO urls
             (url, domain, path, query_string, file_type, first_seen, status, source_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                url,
                parts.domain,
                parts.path,
                parts.query_string,
                parts.file_type,
                now,
                UrlStatus::Pending.to_db_string(),
                source_url
            ],
        )?;

        if changed == 0 {
            return Ok(AddResult::Duplicate);
        }
        Ok(AddResult::Added(self.conn.last_insert_rowid()))
    }

    fn exists(&self, url: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM urls WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    // ===== Lookup =====

    fn query(&self, query: &UrlQuery) -> StorageResult<Vec<UrlRecord>> {
        let mut sql = format!("SELECT {} FROM urls WHERE 1 = 1", RECORD_COLUMNS);
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            values.push(Value::Text(status.to_db_string().to_string()));
        }
        if let Some(domain) = &query.domain {
            sql.push_str(" AND domain = ?");
            values.push(Value::Text(domain.clone()));
        }
        if !query.include_blocked {
            sql.push_str(" AND blocked = 0");
        }
        sql.push_str(" ORDER BY priority DESC, first_seen ASC, id ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn get_by_id(&self, id: i64) -> StorageResult<Option<UrlRecord>> {
        self.get_where("id = ?1", Value::Integer(id))
    }

    fn get_by_url(&self, url: &str) -> StorageResult<Option<UrlRecord>> {
        self.get_where("url = ?1", Value::Text(url.to_string()))
    }

    // ===== Status Transitions =====

    fn mark_crawled(&mut self, id: i64) -> StorageResult<()> {
        let now = Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE urls SET status = ?1, last_crawled = ?2, crawl_count = crawl_count + 1
             WHERE id = ?3",
            params![UrlStatus::Crawled.to_db_string(), now, id],
        )?;
        if changed == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    fn mark_failed(&mut self, id: i64) -> StorageResult<()> {
        self.update_one("UPDATE urls SET status = 'failed' WHERE id = ?1", id)
    }

    fn mark_crawling(&mut self, id: i64) -> StorageResult<()> {
        self.update_one("UPDATE urls SET status = 'crawling' WHERE id = ?1", id)
    }

    fn claim(&mut self, id: i64) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE urls SET status = 'crawling'
             WHERE id = ?1 AND status = 'pending' AND blocked = 0",
            params![id],
        )?;
        Ok(changed == 1)
    }

    fn block(&mut self, id: i64) -> StorageResult<()> {
        self.update_one(
            "UPDATE urls SET blocked = 1, status = 'blocked' WHERE id = ?1",
            id,
        )
    }

    fn unblock(&mut self, id: i64) -> StorageResult<()> {
        self.update_one(
            "UPDATE urls SET blocked = 0, status = 'pending' WHERE id = ?1",
            id,
        )
    }

    fn remove(&mut self, id: i64) -> StorageResult<()> {
        self.update_one("DELETE FROM urls WHERE id = ?1", id)
    }

    fn update_priority(&mut self, id: i64, priority: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE urls SET priority = ?1 WHERE id = ?2",
            params![priority, id],
        )?;
        Ok(())
    }

    fn reset_all(&mut self) -> StorageResult<u64> {
        let changed = self.conn.execute(
            "UPDATE urls SET status = 'pending' WHERE blocked = 0 AND status != 'pending'",
            [],
        )?;
        Ok(changed as u64)
    }

    fn reset_interrupted(&mut self) -> StorageResult<u64> {
        let changed = self.conn.execute(
            "UPDATE urls SET status = 'pending' WHERE status = 'crawling'",
            [],
        )?;
        Ok(changed as u64)
    }

    // ===== Statistics =====

    fn count_total(&self) -> StorageResult<u64> {
        self.count_where("1 = 1")
    }

    fn count_pending(&self) -> StorageResult<u64> {
        self.count_where("status = 'pending' AND blocked = 0")
    }

    fn count_crawled(&self) -> StorageResult<u64> {
        self.count_where("status = 'crawled'")
    }

    fn count_failed(&self) -> StorageResult<u64> {
        self.count_where("status = 'failed'")
    }

    fn count_blocked(&self) -> StorageResult<u64> {
        self.count_where("blocked = 1")
    }

    fn domain_crawl_summary(&self) -> StorageResult<Vec<DomainStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain, SUM(crawl_count), MAX(last_crawled)
             FROM urls WHERE crawl_count > 0
             GROUP BY domain ORDER BY domain",
        )?;

        let stats = stmt
            .query_map([], |row| {
                Ok(DomainStats {
                    domain: row.get(0)?,
                    crawl_count: row.get::<_, i64>(1)? as u64,
                    last_crawled: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }

    // ===== Import / Export =====

    fn export(&self, path: &Path) -> StorageResult<usize> {
        let mut writer = BufWriter::new(File::create(path)?);
        let mut stmt = self.conn.prepare("SELECT url FROM urls ORDER BY id ASC")?;
        let urls = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut written = 0;
        for url in urls {
            writeln!(writer, "{}", url?)?;
            written += 1;
        }
        writer.flush()?;

        Ok(written)
    }

    fn import(&mut self, path: &Path) -> StorageResult<usize> {
        let reader = BufReader::new(File::open(path)?);

        let mut imported = 0;
        for line in reader.lines() {
            let line = line?;
            let url = line.trim();
            if url.is_empty() {
                continue;
            }
            if let AddResult::Added(_) = self.add(url, "")? {
                imported += 1;
            }
        }

        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteUrlStore {
        SqliteUrlStore::new_in_memory().unwrap()
    }

    fn added_id(result: AddResult) -> i64 {
        match result {
            AddResult::Added(id) => id,
            AddResult::Duplicate => panic!("expected a new record"),
        }
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteUrlStore::new_in_memory().is_ok());
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = store();

        let first = store.add("https://example.com/", "").unwrap();
        let second = store.add("https://example.com/", "https://other.com/").unwrap();

        assert!(matches!(first, AddResult::Added(_)));
        assert_eq!(second, AddResult::Duplicate);
        assert_eq!(store.count_total().unwrap(), 1);

        // The duplicate did not overwrite the original source
        let record = store.get_by_url("https://example.com/").unwrap().unwrap();
        assert_eq!(record.source_url, "");
    }

    #[test]
    fn test_add_populates_components() {
        let mut store = store();
        let id = added_id(store.add("https://x.com/a?b=1&c=2", "https://x.com/").unwrap());

        let record = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(record.url, "https://x.com/a?b=1&c=2");
        assert_eq!(record.domain, "x.com");
        assert_eq!(record.path, "/a");
        assert_eq!(record.query_string, "b=1&c=2");
        assert_eq!(record.file_type, "html");
        assert_eq!(record.status, UrlStatus::Pending);
        assert_eq!(record.crawl_count, 0);
        assert!(record.last_crawled.is_none());
        assert_eq!(record.source_url, "https://x.com/");
        assert!(!record.blocked);
    }

    #[test]
    fn test_exists() {
        let mut store = store();
        assert!(!store.exists("https://example.com/").unwrap());
        store.add("https://example.com/", "").unwrap();
        assert!(store.exists("https://example.com/").unwrap());
        assert!(!store.exists("https://example.com").unwrap());
    }

    #[test]
    fn test_mark_crawled_updates_history() {
        let mut store = store();
        let id = added_id(store.add("https://example.com/", "").unwrap());

        store.mark_crawled(id).unwrap();
        store.mark_crawled(id).unwrap();

        let record = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(record.status, UrlStatus::Crawled);
        assert_eq!(record.crawl_count, 2);
        assert!(record.last_crawled.is_some());
        assert_eq!(store.count_crawled().unwrap(), 1);
        assert_eq!(store.count_pending().unwrap(), 0);
    }

    #[test]
    fn test_mark_failed_and_missing_id() {
        let mut store = store();
        let id = added_id(store.add("https://example.com/", "").unwrap());

        store.mark_failed(id).unwrap();
        assert_eq!(store.count_failed().unwrap(), 1);

        assert!(matches!(
            store.mark_failed(9999),
            Err(StorageError::NotFound(9999))
        ));
    }

    #[test]
    fn test_claim_only_once() {
        let mut store = store();
        let id = added_id(store.add("https://example.com/", "").unwrap());

        assert!(store.claim(id).unwrap());
        assert!(!store.claim(id).unwrap());

        let record = store.get_by_id(id).unwrap().unwrap();
        assert_eq!(record.status, UrlStatus::Crawling);
    }

    #[test]
    fn test_block_and_unblock() {
        let mut store = store();
        let id = added_id(store.add("https://example.com/", "").unwrap());

        store.block(id).unwrap();
        let record = store.get_by_id(id).unwrap().unwrap();
        assert!(record.blocked);
        assert_eq!(record.status, UrlStatus::Blocked);
        assert_eq!(store.count_blocked().unwrap(), 1);
        assert_eq!(store.count_pending().unwrap(), 0);
        assert!(!store.claim(id).unwrap());

        store.unblock(id).unwrap();
        let record = store.get_by_id(id).unwrap().unwrap();
        assert!(!record.blocked);
        assert_eq!(record.status, UrlStatus::Pending);
        assert_eq!(store.count_pending().unwrap(), 1);
    }

    #[test]
    fn test_remove() {
        let mut store = store();
        let id = added_id(store.add("https://example.com/", "").unwrap());

        store.remove(id).unwrap();
        assert!(store.get_by_id(id).unwrap().is_none());
        assert!(store.remove(id).is_err());

        // A removed URL can be rediscovered
        assert!(matches!(
            store.add("https://example.com/", "").unwrap(),
            AddResult::Added(_)
        ));
    }

    #[test]
    fn test_query_orders_by_priority_then_age() {
        let mut store = store();
        let a = added_id(store.add("https://a.com/", "").unwrap());
        let b = added_id(store.add("https://b.com/", "").unwrap());
        let c = added_id(store.add("https://c.com/", "").unwrap());

        store.update_priority(b, 10).unwrap();

        let ids: Vec<i64> = store
            .query(&UrlQuery::pending())
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![b, a, c]);
    }

    #[test]
    fn test_query_filters() {
        let mut store = store();
        let a = added_id(store.add("https://a.com/1", "").unwrap());
        store.add("https://a.com/2", "").unwrap();
        let b = added_id(store.add("https://b.com/", "").unwrap());
        store.block(b).unwrap();
        store.mark_crawled(a).unwrap();

        assert_eq!(store.query(&UrlQuery::pending()).unwrap().len(), 1);
        assert_eq!(store.query(&UrlQuery::default()).unwrap().len(), 2);
        assert_eq!(store.query(&UrlQuery::all()).unwrap().len(), 3);
        assert_eq!(
            store
                .query(&UrlQuery::all().with_domain("a.com").with_limit(1))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_reset_interrupted_and_reset_all() {
        let mut store = store();
        let a = added_id(store.add("https://a.com/", "").unwrap());
        let b = added_id(store.add("https://b.com/", "").unwrap());
        let c = added_id(store.add("https://c.com/", "").unwrap());

        store.mark_crawling(a).unwrap();
        store.mark_crawled(b).unwrap();
        store.block(c).unwrap();

        assert_eq!(store.reset_interrupted().unwrap(), 1);
        assert_eq!(store.count_pending().unwrap(), 1);

        assert_eq!(store.reset_all().unwrap(), 1);
        assert_eq!(store.count_pending().unwrap(), 2);
        // Blocked records stay blocked
        assert_eq!(store.count_blocked().unwrap(), 1);
    }

    #[test]
    fn test_domain_crawl_summary() {
        let mut store = store();
        let a1 = added_id(store.add("https://a.com/1", "").unwrap());
        let a2 = added_id(store.add("https://a.com/2", "").unwrap());
        let b = added_id(store.add("https://b.com/", "").unwrap());
        store.add("https://c.com/", "").unwrap();

        store.mark_crawled(a1).unwrap();
        store.mark_crawled(a2).unwrap();
        store.mark_crawled(a2).unwrap();
        store.mark_crawled(b).unwrap();

        let summary = store.domain_crawl_summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].domain, "a.com");
        assert_eq!(summary[0].crawl_count, 3);
        assert_eq!(summary[1].domain, "b.com");
        assert_eq!(summary[1].crawl_count, 1);
    }

    #[test]
    fn test_export_import_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("urls.txt");

        let mut source = store();
        source.add("https://a.com/?x=1&y=2", "").unwrap();
        source.add("https://b.com/", "").unwrap();
        assert_eq!(source.export(&list).unwrap(), 2);

        std::fs::write(
            &list,
            format!("{}\n\n   \nhttps://c.com/\n", std::fs::read_to_string(&list).unwrap()),
        )
        .unwrap();

        let mut target = store();
        target.add("https://b.com/", "").unwrap();
        assert_eq!(target.import(&list).unwrap(), 2);
        assert_eq!(target.count_total().unwrap(), 3);
        assert!(target.exists("https://a.com/?x=1&y=2").unwrap());
    }

    #[test]
    fn test_import_missing_file_is_error() {
        let mut store = store();
        assert!(store.import(Path::new("/nonexistent/urls.txt")).is_err());
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("urls.db");

        {
            let mut store = SqliteUrlStore::new(&db).unwrap();
            store.add("https://example.com/", "").unwrap();
        }

        let store = SqliteUrlStore::new(&db).unwrap();
        assert_eq!(store.count_total().unwrap(), 1);
    }
}
