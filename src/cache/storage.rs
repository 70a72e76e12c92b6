//! SQLite implementation of the named-store backend.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::key::RequestKey;
use super::traits::{CacheStorage, CachedResponse, StoreInfo};
use crate::http::{Response, ResponseType};

/// SQLite-based store backend.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the store database at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the store database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)
          .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
      }
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// A private database that disappears with the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("weather-sw").join("caches.db"))
  }

  /// Run database migrations for store tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for store tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Named stores, id order is creation order
CREATE TABLE IF NOT EXISTS caches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots keyed by request hash
CREATE TABLE IF NOT EXISTS entries (
    cache_id INTEGER NOT NULL,
    request_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    response_type TEXT NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (cache_id, request_hash),
    FOREIGN KEY (cache_id) REFERENCES caches(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_hash ON entries(request_hash);
"#;

/// Raw row as read from `entries`, decoded outside the rusqlite closure.
type EntryRow = (u16, String, String, String, Vec<u8>, String);

const SELECT_ENTRY: &str = "SELECT e.status, e.status_text, e.response_type, e.headers, e.body, e.stored_at
   FROM entries e INNER JOIN caches c ON c.id = e.cache_id";

fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
  Ok((
    row.get(0)?,
    row.get(1)?,
    row.get(2)?,
    row.get(3)?,
    row.get(4)?,
    row.get(5)?,
  ))
}

fn decode_entry(row: EntryRow) -> Result<CachedResponse> {
  let (status, status_text, response_type, headers, body, stored_at) = row;

  let response_type = ResponseType::parse(&response_type)
    .ok_or_else(|| eyre!("Unknown response type in cache: {}", response_type))?;
  let headers: Vec<(String, String)> = serde_json::from_str(&headers)
    .map_err(|e| eyre!("Failed to deserialize cached headers: {}", e))?;

  Ok(CachedResponse {
    response: Response {
      status,
      status_text,
      response_type,
      headers,
      body,
    },
    stored_at: parse_datetime(&stored_at)?,
  })
}

/// Create the store if missing and return its id.
fn ensure_cache(tx: &Transaction<'_>, name: &str) -> Result<i64> {
  tx.execute(
    "INSERT OR IGNORE INTO caches (name) VALUES (?)",
    params![name],
  )
  .map_err(|e| eyre!("Failed to open cache {}: {}", name, e))?;

  tx.query_row(
    "SELECT id FROM caches WHERE name = ?",
    params![name],
    |row| row.get(0),
  )
  .map_err(|e| eyre!("Failed to look up cache {}: {}", name, e))
}

fn insert_entry(
  tx: &Transaction<'_>,
  cache_id: i64,
  key: &RequestKey,
  response: &Response,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  tx.execute(
    "INSERT OR REPLACE INTO entries
       (cache_id, request_hash, method, url, status, status_text, response_type, headers, body, stored_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
    params![
      cache_id,
      key.cache_hash(),
      key.method(),
      key.url(),
      response.status,
      response.status_text,
      response.response_type.as_str(),
      headers,
      response.body,
    ],
  )
  .map_err(|e| eyre!("Failed to store {}: {}", key.description(), e))?;

  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open(&self, name: &str) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;
    ensure_cache(&tx, name)?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn has(&self, name: &str) -> Result<bool> {
    let conn = self.lock()?;
    let found: Option<i64> = conn
      .query_row(
        "SELECT id FROM caches WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to look up cache {}: {}", name, e))?;
    Ok(found.is_some())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT name FROM caches ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read cache name: {}", e))?;

    Ok(names)
  }

  fn delete(&self, name: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM entries WHERE cache_id IN (SELECT id FROM caches WHERE name = ?)",
      params![name],
    )
    .map_err(|e| eyre!("Failed to delete entries of cache {}: {}", name, e))?;

    let removed = tx
      .execute("DELETE FROM caches WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete cache {}: {}", name, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;
    let row = conn
      .query_row(
        &format!("{} WHERE c.name = ? AND e.request_hash = ?", SELECT_ENTRY),
        params![name, key.cache_hash()],
        read_entry,
      )
      .optional()
      .map_err(|e| eyre!("Failed to query cache {}: {}", name, e))?;

    row.map(decode_entry).transpose()
  }

  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>> {
    let conn = self.lock()?;
    let row = conn
      .query_row(
        &format!(
          "{} WHERE e.request_hash = ? ORDER BY c.id LIMIT 1",
          SELECT_ENTRY
        ),
        params![key.cache_hash()],
        read_entry,
      )
      .optional()
      .map_err(|e| eyre!("Failed to query caches: {}", e))?;

    row.map(decode_entry).transpose()
  }

  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let cache_id = ensure_cache(&tx, name)?;
    insert_entry(&tx, cache_id, key, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let cache_id = ensure_cache(&tx, name)?;
    for (key, response) in entries {
      insert_entry(&tx, cache_id, key, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;
    Ok(())
  }

  fn list(&self) -> Result<Vec<StoreInfo>> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare(
        "SELECT c.name, COUNT(e.request_hash) FROM caches c
         LEFT JOIN entries e ON e.cache_id = c.id
         GROUP BY c.id
         ORDER BY c.id",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows = stmt
      .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
      .map_err(|e| eyre!("Failed to list caches: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read cache listing: {}", e))?;

    Ok(
      rows
        .into_iter()
        .map(|(name, count)| StoreInfo {
          name,
          entries: usize::try_from(count).unwrap_or(0),
        })
        .collect(),
    )
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
