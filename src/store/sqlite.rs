use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Mutex;

use super::{KvStore, ScanPage, StoredEntry};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-backed [`KvStore`].
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open (or create) the database file, creating parent directories.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

impl KvStore for SqliteStore {
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
    let conn = self.lock()?;
    let raw: Option<String> = conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))?;

    match raw {
      Some(data) => {
        let value = serde_json::from_str(&data)
          .map_err(|e| eyre!("Failed to deserialize {}: {}", key, e))?;
        Ok(Some(value))
      }
      None => Ok(None),
    }
  }

  fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    let data =
      serde_json::to_string(value).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    let conn = self.lock()?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, data],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", key, e))?;
    Ok(())
  }

  fn delete(&self, key: &str) -> Result<bool> {
    let conn = self.lock()?;
    let removed = conn
      .execute("DELETE FROM kv WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete {}: {}", key, e))?;
    Ok(removed > 0)
  }

  fn scan(&self, cursor: Option<&str>, limit: usize) -> Result<ScanPage> {
    let conn = self.lock()?;
    let mut stmt = conn
      .prepare("SELECT key, value FROM kv WHERE key > ? ORDER BY key LIMIT ?")
      .map_err(|e| eyre!("Failed to prepare scan: {}", e))?;

    let rows: Vec<(String, String)> = stmt
      .query_map(params![cursor.unwrap_or(""), limit as i64], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .map_err(|e| eyre!("Failed to scan store: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read scanned row: {}", e))?;

    let next_cursor = if rows.len() == limit {
      rows.last().map(|(k, _)| k.clone())
    } else {
      None
    };

    // Undecodable values are skipped rather than failing the whole page
    let entries = rows
      .into_iter()
      .filter_map(|(key, data)| {
        serde_json::from_str(&data)
          .ok()
          .map(|value| StoredEntry { key, value })
      })
      .collect();

    Ok(ScanPage {
      entries,
      next_cursor,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct Item {
    name: String,
    count: u32,
  }

  #[test]
  fn test_get_set_delete() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.get::<Item>("a").unwrap(), None);

    let item = Item {
      name: "first".into(),
      count: 1,
    };
    store.set("a", &item).unwrap();
    assert_eq!(store.get::<Item>("a").unwrap(), Some(item));

    store
      .set(
        "a",
        &Item {
          name: "second".into(),
          count: 2,
        },
      )
      .unwrap();
    assert_eq!(store.get::<Item>("a").unwrap().unwrap().name, "second");

    assert!(store.delete("a").unwrap());
    assert!(!store.delete("a").unwrap());
    assert_eq!(store.get::<Item>("a").unwrap(), None);
  }

  #[test]
  fn test_scan_pages_in_key_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    for key in ["report:c", "report:a", "schedules", "report:b"] {
      store.set(key, &key).unwrap();
    }

    let first = store.scan(None, 2).unwrap();
    let keys: Vec<_> = first.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["report:a", "report:b"]);
    assert_eq!(first.next_cursor.as_deref(), Some("report:b"));

    let second = store.scan(first.next_cursor.as_deref(), 2).unwrap();
    let keys: Vec<_> = second.entries.iter().map(|e| e.key.as_str()).collect();
    assert_eq!(keys, vec!["report:c", "schedules"]);

    let third = store.scan(second.next_cursor.as_deref(), 2).unwrap();
    assert!(third.entries.is_empty());
    assert!(third.next_cursor.is_none());
  }

  #[test]
  fn test_file_store_persists_across_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.db");

    {
      let store = SqliteStore::open(&path).unwrap();
      store.set("schedules", &vec![1, 2, 3]).unwrap();
    }

    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.get::<Vec<u32>>("schedules").unwrap(), Some(vec![1, 2, 3]));
  }
}
