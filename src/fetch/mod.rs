//! Cancellable batched fetching of cache misses.
//!
//! The coordinator owns the query-generation bookkeeping: starting a new
//! top-level query opens a new generation, cancels every network
//! operation still in flight for the previous one, and resets progress.
//! Unknown keys are partitioned into fixed-size batches, all issued
//! concurrently; each arriving batch is validated against the current
//! generation before any of its data is cached or merged, so a superseded
//! query can never leak stale features into a newer result.

mod accumulator;

pub use accumulator::Accumulator;

use crate::cache::{CacheError, FeatureCache};
use crate::config::NegativeCachePolicy;
use crate::endpoint::{DataEndpoint, DataRequest, EndpointError};
use crate::feature::{EnvelopeMetadata, Feature};
use crate::hooks::Hooks;
use crate::progress::ProgressReporter;
use crate::strategy::CompositeKey;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Errors from the fetch coordinator.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure for one of the generation's batches.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    /// Cache write failure while committing a batch.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The generation was superseded by a newer query before completion.
    #[error("query superseded by a newer request")]
    Superseded,
}

/// Handle for one query generation.
///
/// Issued by [`FetchCoordinator::begin_generation`]; every async
/// operation of the generation captures it and re-checks validity before
/// committing side effects.
#[derive(Debug)]
pub struct Generation {
    id: u64,
    token: CancellationToken,
}

impl Generation {
    /// Numeric identifier, strictly increasing across queries.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether a newer query has superseded this generation.
    ///
    /// Once true, no side effect observable outside the query (progress
    /// reports, completion hooks, cache writes) may be published on its
    /// behalf.
    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }

    #[cfg(test)]
    pub(crate) fn standalone() -> Self {
        Self {
            id: 0,
            token: CancellationToken::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn supersede(&self) {
        self.token.cancel();
    }
}

#[derive(Debug)]
struct ActiveGeneration {
    id: u64,
    token: CancellationToken,
}

/// Batches, fetches, and merges the unknown keys of a generation.
pub struct FetchCoordinator {
    cache: Arc<dyn FeatureCache>,
    endpoint: Arc<dyn DataEndpoint>,
    progress: ProgressReporter,
    batch_size: usize,
    negative_cache: NegativeCachePolicy,
    /// Current generation id, readable without the lock.
    current: AtomicU64,
    active: Mutex<ActiveGeneration>,
}

impl FetchCoordinator {
    /// Create a coordinator over the given collaborators.
    pub fn new(
        cache: Arc<dyn FeatureCache>,
        endpoint: Arc<dyn DataEndpoint>,
        progress: ProgressReporter,
        batch_size: usize,
        negative_cache: NegativeCachePolicy,
    ) -> Self {
        Self {
            cache,
            endpoint,
            progress,
            batch_size,
            negative_cache,
            current: AtomicU64::new(0),
            active: Mutex::new(ActiveGeneration {
                id: 0,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Open a new query generation.
    ///
    /// Cancels all network operations of the previous generation
    /// (best-effort: signalled, not guaranteed to stop instantly) and
    /// resets observable progress to zero. Must be called before the new
    /// query's strategy is computed.
    pub fn begin_generation(&self) -> Generation {
        let generation = {
            let mut active = self.active.lock().unwrap();
            active.token.cancel();
            active.id += 1;
            active.token = CancellationToken::new();
            self.current.store(active.id, Ordering::SeqCst);
            debug!(generation = active.id, "generation opened");
            Generation {
                id: active.id,
                token: active.token.clone(),
            }
        };
        self.progress.reset();
        generation
    }

    pub(crate) fn is_current(&self, generation: &Generation) -> bool {
        self.current.load(Ordering::SeqCst) == generation.id
    }

    /// Fetch all unknown keys of a generation and merge the results.
    ///
    /// Keys are partitioned into batches of the configured size and all
    /// batches are issued concurrently. A failed batch does not roll back
    /// sibling batches or their cache writes; its error is surfaced for
    /// the generation after every batch has settled. Supersession wins
    /// over other failures since the query was abandoned anyway.
    pub async fn fetch(
        &self,
        unknown: &[CompositeKey],
        request: &DataRequest,
        generation: &Generation,
        accumulator: &Accumulator,
        hooks: &Hooks,
    ) -> Result<(), FetchError> {
        let batches = unknown
            .chunks(self.batch_size)
            .map(|batch| self.run_batch(batch, request, generation, accumulator, hooks));
        let results = join_all(batches).await;

        let mut superseded = false;
        let mut outcome = Ok(());
        for result in results {
            match result {
                Ok(()) => {}
                Err(FetchError::Superseded) => superseded = true,
                Err(error) => {
                    warn!(generation = generation.id, %error, "batch failed");
                    if outcome.is_ok() {
                        outcome = Err(error);
                    }
                }
            }
        }
        if superseded {
            return Err(FetchError::Superseded);
        }
        outcome
    }

    async fn run_batch(
        &self,
        batch: &[CompositeKey],
        request: &DataRequest,
        generation: &Generation,
        accumulator: &Accumulator,
        hooks: &Hooks,
    ) -> Result<(), FetchError> {
        let request = request.for_batch(batch);
        let envelope = tokio::select! {
            _ = generation.token.cancelled() => {
                debug!(generation = generation.id, "batch cancelled by supersession");
                return Err(FetchError::Superseded);
            }
            result = self.endpoint.fetch_indexes(&request) => result?,
        };

        // The request may have settled despite cancellation; validate the
        // generation before any side effect.
        if !self.is_current(generation) {
            debug!(
                generation = generation.id,
                "discarding batch result from superseded generation"
            );
            return Err(FetchError::Superseded);
        }

        self.cache_features(
            &envelope.features,
            envelope.metadata.as_ref(),
            Some(generation),
            hooks,
        )
        .await?;

        // Cache writes may suspend; validate once more before publishing
        // progress or firing the completion hook.
        if !self.is_current(generation) {
            return Err(FetchError::Superseded);
        }

        let (fraction, completed) = accumulator.merge_batch(batch.len(), envelope.features);
        self.progress.report(fraction);
        if let Some(features) = completed {
            debug!(
                generation = generation.id,
                features = features.len(),
                "generation complete"
            );
            hooks.notify_after_supplementary(&features);
        }
        Ok(())
    }

    /// Write a feature batch to the cache, framed by the caching hooks.
    ///
    /// With `generation` set, each returned feature is stored under its
    /// own composite index, and every index the envelope's accounting
    /// lists as queried but unanswered becomes a negative entry (policy
    /// permitting). With `generation` absent this is the dry-run pass:
    /// hooks fire, storage is untouched. Writes re-check generation
    /// validity so a superseded batch cannot clobber a newer generation's
    /// entry.
    pub(crate) async fn cache_features(
        &self,
        features: &[Feature],
        metadata: Option<&EnvelopeMetadata>,
        generation: Option<&Generation>,
        hooks: &Hooks,
    ) -> Result<(), FetchError> {
        hooks.notify_before_caching(features);

        if let (Some(metadata), Some(generation)) = (metadata, generation) {
            for feature in features {
                if !self.is_current(generation) {
                    return Err(FetchError::Superseded);
                }
                let key = CompositeKey::from_raw(feature.index());
                self.cache.set(&key, Some(feature.clone())).await?;
            }

            if self.negative_cache == NegativeCachePolicy::Permanent {
                let found: HashSet<&str> = features.iter().map(Feature::index).collect();
                for index in &metadata.query_indexes {
                    if found.contains(index.as_str()) {
                        continue;
                    }
                    if !self.is_current(generation) {
                        return Err(FetchError::Superseded);
                    }
                    self.cache.set(&CompositeKey::from_raw(index.clone()), None).await?;
                }
            }
        }

        hooks.notify_after_caching(features);
        Ok(())
    }
}
