//! Client configuration.

use std::time::Duration;

/// Default number of composite keys per network batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default number of composite keys per page in direct index queries.
pub const DEFAULT_INDEX_PAGE_SIZE: usize = 2;

/// Default lower bound on the cell count of a polygon strategy.
pub const DEFAULT_MIN_CELLS: usize = 100;

/// Default upper bound on the cell count of a polygon strategy.
pub const DEFAULT_MAX_CELLS: usize = 1000;

/// Default trailing-edge debounce window for progress updates.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Region-independent demographic filters carried on every data request.
///
/// Each field is a category label understood by the data endpoint; the
/// reserved label `"default"` selects the unfiltered aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    /// Age category
    pub age: String,
    /// Gender category
    pub gender: String,
    /// Ethnicity category
    pub ethnicity: String,
    /// Income category
    pub income: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            age: "default".to_string(),
            gender: "default".to_string(),
            ethnicity: "default".to_string(),
            income: "default".to_string(),
        }
    }
}

/// Policy for negative cache entries (keys confirmed to hold no data).
///
/// Negative entries never expire on their own; `Disabled` exists for
/// deployments whose upstream data refreshes in place, where a permanent
/// "no data" marker would go stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegativeCachePolicy {
    /// Write a permanent marker for every queried key with no data.
    #[default]
    Permanent,
    /// Never write negative markers; empty keys are re-queried each time.
    Disabled,
}

/// Configuration for a [`GeodemoClient`](crate::client::GeodemoClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the data service. Required; construction fails when empty.
    pub domain: String,
    /// Default demographic filters applied when a query supplies none.
    pub filters: Filters,
    /// Composite keys per cancellable network batch.
    pub batch_size: usize,
    /// Composite keys per page in direct index queries.
    pub index_page_size: usize,
    /// Refinement threshold: polygon strategies grow resolution until at
    /// least this many cells cover the region.
    pub min_cells: usize,
    /// Coarsening threshold: polygon strategies shrink resolution while
    /// more than this many cells cover the region.
    pub max_cells: usize,
    /// Debounce window for externally observable progress updates.
    pub debounce_window: Duration,
    /// Negative cache policy.
    pub negative_cache: NegativeCachePolicy,
}

impl ClientConfig {
    /// Create a configuration for the given service domain with defaults
    /// for everything else.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            filters: Filters::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            index_page_size: DEFAULT_INDEX_PAGE_SIZE,
            min_cells: DEFAULT_MIN_CELLS,
            max_cells: DEFAULT_MAX_CELLS,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            negative_cache: NegativeCachePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_are_unfiltered() {
        let filters = Filters::default();
        assert_eq!(filters.age, "default");
        assert_eq!(filters.gender, "default");
        assert_eq!(filters.ethnicity, "default");
        assert_eq!(filters.income, "default");
    }

    #[test]
    fn config_defaults() {
        let config = ClientConfig::new("https://api.example.com");
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.min_cells, 100);
        assert_eq!(config.max_cells, 1000);
        assert_eq!(config.negative_cache, NegativeCachePolicy::Permanent);
    }
}
