//! Optional collaborator hooks around the data pipeline.
//!
//! Collaborators (UI layers, recorders, voice output) can observe the
//! pipeline at fixed points without being polled for. Every slot is
//! optional, synchronous, and best-effort: the orchestrator calls a hook
//! inline if one is registered and never waits on it beyond the call.

use crate::feature::{Feature, FeatureCollection};
use crate::strategy::Strategy;

/// Hook receiving a feature slice.
pub type FeatureHook = Box<dyn Fn(&[Feature]) + Send + Sync>;

/// Hook receiving the resolved strategy.
pub type StrategyHook = Box<dyn Fn(&Strategy) + Send + Sync>;

/// Hook receiving the final feature collection.
pub type CollectionHook = Box<dyn Fn(&FeatureCollection) + Send + Sync>;

/// Hook receiving no payload.
pub type SignalHook = Box<dyn Fn() + Send + Sync>;

/// Typed set of optional listener slots, configured at construction.
///
/// # Example
///
/// ```ignore
/// let hooks = Hooks::new()
///     .on_after_supplementary(|features| println!("loaded {} features", features.len()));
/// ```
#[derive(Default)]
pub struct Hooks {
    before_get_data: Option<SignalHook>,
    after_get_data: Option<CollectionHook>,
    before_strategy: Option<SignalHook>,
    after_strategy: Option<StrategyHook>,
    before_caching: Option<FeatureHook>,
    after_caching: Option<FeatureHook>,
    before_supplementary: Option<FeatureHook>,
    after_supplementary: Option<FeatureHook>,
}

impl Hooks {
    /// Create an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called at the start of every top-level data query.
    pub fn on_before_get_data(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_get_data = Some(Box::new(hook));
        self
    }

    /// Called with the final collection of a completed data query.
    pub fn on_after_get_data(
        mut self,
        hook: impl Fn(&FeatureCollection) + Send + Sync + 'static,
    ) -> Self {
        self.after_get_data = Some(Box::new(hook));
        self
    }

    /// Called before strategy resolution begins.
    pub fn on_before_strategy(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.before_strategy = Some(Box::new(hook));
        self
    }

    /// Called with the resolved strategy.
    pub fn on_after_strategy(
        mut self,
        hook: impl Fn(&Strategy) + Send + Sync + 'static,
    ) -> Self {
        self.after_strategy = Some(Box::new(hook));
        self
    }

    /// Called with a feature batch before it is written to the cache.
    ///
    /// Also fired during the dry-run pass over already-cached features, so
    /// observers of "data became available" behave uniformly whether the
    /// data came from cache or network.
    pub fn on_before_caching(
        mut self,
        hook: impl Fn(&[Feature]) + Send + Sync + 'static,
    ) -> Self {
        self.before_caching = Some(Box::new(hook));
        self
    }

    /// Called with a feature batch after it was written to the cache
    /// (or after the dry-run pass).
    pub fn on_after_caching(
        mut self,
        hook: impl Fn(&[Feature]) + Send + Sync + 'static,
    ) -> Self {
        self.after_caching = Some(Box::new(hook));
        self
    }

    /// Called with the cached features before any network fetches start.
    pub fn on_before_supplementary(
        mut self,
        hook: impl Fn(&[Feature]) + Send + Sync + 'static,
    ) -> Self {
        self.before_supplementary = Some(Box::new(hook));
        self
    }

    /// Called exactly once per query generation with the full accumulated
    /// feature set, when every key has been resolved from cache or network.
    pub fn on_after_supplementary(
        mut self,
        hook: impl Fn(&[Feature]) + Send + Sync + 'static,
    ) -> Self {
        self.after_supplementary = Some(Box::new(hook));
        self
    }

    pub(crate) fn notify_before_get_data(&self) {
        if let Some(hook) = &self.before_get_data {
            hook();
        }
    }

    pub(crate) fn notify_after_get_data(&self, collection: &FeatureCollection) {
        if let Some(hook) = &self.after_get_data {
            hook(collection);
        }
    }

    pub(crate) fn notify_before_strategy(&self) {
        if let Some(hook) = &self.before_strategy {
            hook();
        }
    }

    pub(crate) fn notify_after_strategy(&self, strategy: &Strategy) {
        if let Some(hook) = &self.after_strategy {
            hook(strategy);
        }
    }

    pub(crate) fn notify_before_caching(&self, features: &[Feature]) {
        if let Some(hook) = &self.before_caching {
            hook(features);
        }
    }

    pub(crate) fn notify_after_caching(&self, features: &[Feature]) {
        if let Some(hook) = &self.after_caching {
            hook(features);
        }
    }

    pub(crate) fn notify_before_supplementary(&self, features: &[Feature]) {
        if let Some(hook) = &self.before_supplementary {
            hook(features);
        }
    }

    pub(crate) fn notify_after_supplementary(&self, features: &[Feature]) {
        if let Some(hook) = &self.after_supplementary {
            hook(features);
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before_get_data", &self.before_get_data.is_some())
            .field("after_get_data", &self.after_get_data.is_some())
            .field("before_strategy", &self.before_strategy.is_some())
            .field("after_strategy", &self.after_strategy.is_some())
            .field("before_caching", &self.before_caching.is_some())
            .field("after_caching", &self.after_caching.is_some())
            .field("before_supplementary", &self.before_supplementary.is_some())
            .field("after_supplementary", &self.after_supplementary.is_some())
            .finish()
    }
}
