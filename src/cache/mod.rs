//! Versioned named stores of request → response snapshots.
//!
//! This module provides the persistence side of the worker:
//! - Stores are addressed by name, and names carry a version tag
//! - Entries are keyed by request identity (method + URL)
//! - Lookups can target one store or search all of them in creation order

mod key;
mod storage;
mod traits;

pub use key::RequestKey;
pub use storage::SqliteStorage;
pub use traits::{CacheStorage, CachedResponse, StoreInfo, StoreNames};
