//! Core traits and types for the versioned store system.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use super::key::RequestKey;
use crate::http::Response;

/// A response snapshot together with the time it was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  /// The stored response, returned unchanged on a hit
  pub response: Response,
  /// When the snapshot was written
  pub stored_at: DateTime<Utc>,
}

/// Summary of one named store, for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreInfo {
  pub name: String,
  pub entries: usize,
}

/// Trait for named-store backends.
///
/// Each call is atomic on its own. Writes to the same key race and the last one wins.
pub trait CacheStorage: Send + Sync {
  /// Create the named store if it does not exist yet.
  fn open(&self, name: &str) -> Result<()>;

  /// Whether the named store exists.
  fn has(&self, name: &str) -> Result<bool>;

  /// Names of all stores in creation order.
  fn keys(&self) -> Result<Vec<String>>;

  /// Delete the named store and everything in it. Returns whether it existed.
  fn delete(&self, name: &str) -> Result<bool>;

  /// Look a request up in one store.
  fn match_in(&self, name: &str, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Look a request up across all stores, oldest store first.
  fn match_any(&self, key: &RequestKey) -> Result<Option<CachedResponse>>;

  /// Store a response, creating the store if needed. Overwrites an existing entry.
  fn put(&self, name: &str, key: &RequestKey, response: &Response) -> Result<()>;

  /// Store all responses or none of them.
  fn put_all(&self, name: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

  /// List stores with their entry counts.
  fn list(&self) -> Result<Vec<StoreInfo>>;
}

/// The two store names of one worker version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
  /// Pre-populated at install
  pub static_store: String,
  /// Filled lazily from API responses
  pub runtime_store: String,
}

impl StoreNames {
  pub fn new(prefix: &str, version: &str) -> Self {
    Self {
      static_store: format!("{}-v{}", prefix, version),
      runtime_store: format!("{}-runtime-v{}", prefix, version),
    }
  }

  /// Whether `name` belongs to the current version.
  pub fn is_current(&self, name: &str) -> bool {
    name == self.static_store || name == self.runtime_store
  }
}
