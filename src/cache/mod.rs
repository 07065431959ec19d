//! Persistent feature cache interface and in-memory implementation.
//!
//! The cache stores one entry per composite key with three-way semantics:
//! a key is *unknown* (never queried, absent from the cache), *negative*
//! (queried once, confirmed empty, held as an explicit marker so it is
//! never re-queried), or a *hit* (a stored feature). The orchestrator only
//! ever moves a key from unknown to one of the other two states; a newer
//! query generation may overwrite an entry, older generations never do.

use crate::feature::Feature;
use crate::strategy::CompositeKey;
use dashmap::DashMap;
use futures::future::BoxFuture;
use thiserror::Error;

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failure in the backing store.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Result of one cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Key never queried; the caller must fetch it.
    Missing,
    /// Key queried before and confirmed to hold no data.
    Negative,
    /// Cached feature for the key.
    Hit(Feature),
}

/// Cache abstraction over a persistent key-value store.
///
/// Lookups and writes are async because real backings (browser storage,
/// embedded databases) suspend. `set` with `None` writes the negative
/// marker, which is distinct from the key being absent. Implementations
/// must keep an entry durable until externally cleared.
pub trait FeatureCache: Send + Sync {
    /// Look up the entry for a key.
    fn get<'a>(&'a self, key: &'a CompositeKey) -> BoxFuture<'a, Result<CacheLookup, CacheError>>;

    /// Store a feature, or the negative marker when `value` is `None`.
    fn set<'a>(
        &'a self,
        key: &'a CompositeKey,
        value: Option<Feature>,
    ) -> BoxFuture<'a, Result<(), CacheError>>;
}

/// In-memory cache implementation.
///
/// Suitable for tests and for hosts that provide no durable store; entries
/// live for the process lifetime.
#[derive(Debug, Default)]
pub struct MemoryFeatureCache {
    entries: DashMap<String, Option<Feature>>,
}

impl MemoryFeatureCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, negative markers included.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl FeatureCache for MemoryFeatureCache {
    fn get<'a>(&'a self, key: &'a CompositeKey) -> BoxFuture<'a, Result<CacheLookup, CacheError>> {
        Box::pin(async move {
            let lookup = match self.entries.get(key.as_str()) {
                None => CacheLookup::Missing,
                Some(entry) => match entry.value() {
                    None => CacheLookup::Negative,
                    Some(feature) => CacheLookup::Hit(feature.clone()),
                },
            };
            Ok(lookup)
        })
    }

    fn set<'a>(
        &'a self,
        key: &'a CompositeKey,
        value: Option<Feature>,
    ) -> BoxFuture<'a, Result<(), CacheError>> {
        Box::pin(async move {
            self.entries.insert(key.as_str().to_string(), value);
            Ok(())
        })
    }
}
