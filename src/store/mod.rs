//! Key-value persistence for schedules and saved reports.

mod sqlite;

pub use sqlite::SqliteStore;

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// One stored key and its raw JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
  pub key: String,
  pub value: Value,
}

/// A bounded slice of the keyspace, in key order.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
  pub entries: Vec<StoredEntry>,
  /// Pass back to `scan` for the next page; `None` once exhausted
  pub next_cursor: Option<String>,
}

/// Trait for key-value storage backends.
///
/// Values are serialized as JSON. Each call is atomic for its key.
pub trait KvStore: Send + Sync {
  /// Get a value, `None` when the key is absent.
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

  /// Insert or replace a value.
  fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()>;

  /// Remove a key. Returns whether it existed.
  fn delete(&self, key: &str) -> Result<bool>;

  /// List up to `limit` entries with keys strictly after `cursor`.
  fn scan(&self, cursor: Option<&str>, limit: usize) -> Result<ScanPage>;
}
