//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

use crate::db::Database;
use crate::http::{Response, ResponseType};

/// A stored response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Trait for cache storage backends.
///
/// `key` is always a request cache key as produced by `Request::cache_key`.
pub trait CacheStorage: Send + Sync {
  /// Create the partition if it does not exist yet.
  fn open(&self, name: &str) -> Result<()>;

  /// Whether a partition with this name exists.
  fn has(&self, name: &str) -> Result<bool>;

  /// Names of all partitions in creation order.
  fn names(&self) -> Result<Vec<String>>;

  /// Delete a partition and all its entries. Returns false if it did not exist.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Store a response, replacing any entry under the same key. Creates the partition if needed.
  fn put(&self, name: &str, key: &str, response: &Response) -> Result<()>;

  /// Look up a key in one partition.
  fn get(&self, name: &str, key: &str) -> Result<Option<CachedResponse>>;

  /// Look up a key across all partitions, first partition wins.
  fn find(&self, key: &str) -> Result<Option<CachedResponse>>;

  /// Keys stored in a partition, oldest write first.
  fn keys(&self, name: &str) -> Result<Vec<String>>;

  /// Remove one entry. Returns false if it did not exist.
  fn remove(&self, name: &str, key: &str) -> Result<bool>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  db: Mutex<Database>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    Ok(Self {
      db: Mutex::new(Database::open(path)?),
    })
  }

  /// Storage that is discarded when dropped.
  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    Ok(Self {
      db: Mutex::new(Database::open_in_memory()?),
    })
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Database>> {
    self.db.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

const ENTRY_COLUMNS: &str = "e.status, e.status_text, e.headers, e.body, e.response_type, e.response_url, e.cached_at";

/// Raw column values of one entry row
struct EntryRow {
  status: u16,
  status_text: String,
  headers: String,
  body: Vec<u8>,
  response_type: String,
  response_url: String,
  cached_at: String,
}

impl EntryRow {
  fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      status: row.get(0)?,
      status_text: row.get(1)?,
      headers: row.get(2)?,
      body: row.get(3)?,
      response_type: row.get(4)?,
      response_url: row.get(5)?,
      cached_at: row.get(6)?,
    })
  }

  fn into_cached(self) -> Result<CachedResponse> {
    let headers: Vec<(String, String)> = serde_json::from_str(&self.headers)
      .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
    let kind = ResponseType::parse(&self.response_type)
      .ok_or_else(|| eyre!("Unknown response type '{}'", self.response_type))?;

    Ok(CachedResponse {
      response: Response {
        status: self.status,
        status_text: self.status_text,
        headers,
        body: self.body,
        kind,
        url: self.response_url,
      },
      cached_at: parse_datetime(&self.cached_at)?,
    })
  }
}

impl CacheStorage for SqliteStorage {
  fn open(&self, name: &str) -> Result<()> {
    let db = self.lock()?;
    db.conn()
      .execute(
        "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;
    Ok(())
  }

  fn has(&self, name: &str) -> Result<bool> {
    let db = self.lock()?;
    let found: Option<i64> = db
      .conn()
      .query_row(
        "SELECT id FROM partitions WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up cache {}: {}", name, e))?;
    Ok(found.is_some())
  }

  fn names(&self) -> Result<Vec<String>> {
    let db = self.lock()?;
    let mut stmt = db
      .conn()
      .prepare("SELECT name FROM partitions ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let db = self.lock()?;
    let conn = db.conn();

    conn
      .execute(
        "DELETE FROM entries WHERE partition_id IN (SELECT id FROM partitions WHERE name = ?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to delete entries of cache {}: {}", name, e))?;

    let deleted = conn
      .execute("DELETE FROM partitions WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", name, e))?;

    Ok(deleted > 0)
  }

  fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
    let headers = serde_json::to_string(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    let db = self.lock()?;
    let conn = db.conn();

    conn
      .execute(
        "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entries
           (partition_id, key_hash, url, status, status_text, headers, body, response_type, response_url, cached_at)
         VALUES ((SELECT id FROM partitions WHERE name = ?), ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          name,
          key_hash(key),
          key,
          response.status,
          response.status_text,
          headers,
          response.body,
          response.kind.as_str(),
          response.url,
        ],
      )
      .map_err(|e| eyre!("Failed to store {} in cache {}: {}", key, name, e))?;

    Ok(())
  }

  fn get(&self, name: &str, key: &str) -> Result<Option<CachedResponse>> {
    let db = self.lock()?;
    let sql = format!(
      "SELECT {} FROM entries e
       INNER JOIN partitions p ON p.id = e.partition_id
       WHERE p.name = ? AND e.key_hash = ?",
      ENTRY_COLUMNS
    );

    let row = db
      .conn()
      .query_row(&sql, params![name, key_hash(key)], EntryRow::from_row)
      .optional()
      .map_err(|e| eyre!("Failed to match {} in cache {}: {}", key, name, e))?;

    row.map(EntryRow::into_cached).transpose()
  }

  fn find(&self, key: &str) -> Result<Option<CachedResponse>> {
    let db = self.lock()?;
    let sql = format!(
      "SELECT {} FROM entries e
       INNER JOIN partitions p ON p.id = e.partition_id
       WHERE e.key_hash = ?
       ORDER BY p.id
       LIMIT 1",
      ENTRY_COLUMNS
    );

    let row = db
      .conn()
      .query_row(&sql, params![key_hash(key)], EntryRow::from_row)
      .optional()
      .map_err(|e| eyre!("Failed to match {}: {}", key, e))?;

    row.map(EntryRow::into_cached).transpose()
  }

  fn keys(&self, name: &str) -> Result<Vec<String>> {
    let db = self.lock()?;
    let mut stmt = db
      .conn()
      .prepare(
        "SELECT e.url FROM entries e
         INNER JOIN partitions p ON p.id = e.partition_id
         WHERE p.name = ?
         ORDER BY e.rowid",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys = stmt
      .query_map(params![name], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list keys of cache {}: {}", name, e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache key: {}", e))?;

    Ok(keys)
  }

  fn remove(&self, name: &str, key: &str) -> Result<bool> {
    let db = self.lock()?;
    let removed = db
      .conn()
      .execute(
        "DELETE FROM entries
         WHERE partition_id = (SELECT id FROM partitions WHERE name = ?) AND key_hash = ?",
        params![name, key_hash(key)],
      )
      .map_err(|e| eyre!("Failed to remove {} from cache {}: {}", key, name, e))?;

    Ok(removed > 0)
  }
}

/// SHA256 hash for stable, fixed-length entry keys
fn key_hash(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
