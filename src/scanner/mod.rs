//! Cache scanning for a resolved strategy.
//!
//! Partitions a strategy's keys into already-known entries (hits and
//! negative markers) and unknown keys that still need a network fetch.
//! Lookups run concurrently with no ordering dependency; every known key
//! counts as a completion and advances progress as its lookup resolves.

use crate::cache::{CacheError, CacheLookup, FeatureCache};
use crate::feature::Feature;
use crate::fetch::{Accumulator, Generation};
use crate::progress::ProgressReporter;
use crate::strategy::{CompositeKey, Strategy};
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Partition of a strategy after scanning the cache.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Features found in the cache.
    pub known: Vec<Feature>,
    /// Keys confirmed empty by a previous query; complete, never fetched.
    pub negative_count: usize,
    /// Keys never queried before, in strategy order.
    pub unknown: Vec<CompositeKey>,
}

impl ScanOutcome {
    /// Whether every key resolved from the cache.
    pub fn is_fully_cached(&self) -> bool {
        self.unknown.is_empty()
    }
}

/// Scans the persistent cache for a strategy's keys.
pub struct CacheScanner {
    cache: Arc<dyn FeatureCache>,
}

impl CacheScanner {
    /// Create a scanner over the given cache.
    pub fn new(cache: Arc<dyn FeatureCache>) -> Self {
        Self { cache }
    }

    /// Look up every strategy key concurrently and classify the results.
    ///
    /// Hits and negative entries are recorded in the accumulator as they
    /// resolve, each advancing the reported progress fraction as long as
    /// `generation` is still current. The returned partition keeps
    /// unknown keys in strategy order.
    pub async fn scan(
        &self,
        strategy: &Strategy,
        generation: &Generation,
        accumulator: &Accumulator,
        progress: &ProgressReporter,
    ) -> Result<ScanOutcome, CacheError> {
        let lookups = strategy.keys().iter().map(|key| async move {
            let lookup = self.cache.get(key).await?;
            let fraction = match &lookup {
                CacheLookup::Missing => None,
                CacheLookup::Negative => Some(accumulator.record_cached(None)),
                CacheLookup::Hit(feature) => {
                    Some(accumulator.record_cached(Some(feature.clone())))
                }
            };
            // A lookup may resolve after a newer query has reset the
            // shared reporter; a superseded generation must not publish
            // into it.
            if let Some(fraction) = fraction {
                if !generation.is_superseded() {
                    progress.report(fraction);
                }
            }
            Ok::<CacheLookup, CacheError>(lookup)
        });
        let results = join_all(lookups).await;

        let mut outcome = ScanOutcome {
            known: Vec::new(),
            negative_count: 0,
            unknown: Vec::new(),
        };
        for (key, result) in strategy.keys().iter().zip(results) {
            match result? {
                CacheLookup::Missing => outcome.unknown.push(key.clone()),
                CacheLookup::Negative => outcome.negative_count += 1,
                CacheLookup::Hit(feature) => outcome.known.push(feature),
            }
        }

        debug!(
            known = outcome.known.len(),
            negative = outcome.negative_count,
            unknown = outcome.unknown.len(),
            "cache scan complete"
        );
        Ok(outcome)
    }
}
