//! High-level client facade.
//!
//! Wires the strategy resolver, cache scanner, fetch coordinator, and
//! progress reporter into one entry point, following the same facade
//! pattern as the component modules' own builders. Construction resolves
//! the service's initialization endpoints (available dates and the voice
//! authorization token) before any data query can run.

use crate::cache::{CacheError, FeatureCache};
use crate::config::{ClientConfig, Filters};
use crate::endpoint::{DataEndpoint, DataRequest, EndpointError, HttpEndpoint};
use crate::feature::FeatureCollection;
use crate::fetch::{Accumulator, FetchCoordinator, FetchError};
use crate::hooks::Hooks;
use crate::progress::ProgressReporter;
use crate::scanner::CacheScanner;
use crate::strategy::{CompositeKey, QueryRegion, StrategyError, StrategyResolver};
use crate::tessellation::Tessellation;
use futures::future::try_join_all;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Errors surfaced by [`GeodemoClient`] operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No service domain was configured.
    #[error("domain parameter missing in client initialization")]
    MissingDomain,
    /// The service reported no available dates at initialization.
    #[error("no dates available from the data service")]
    NoDatesAvailable,
    /// A direct index query with an empty index or date list.
    #[error("indexes and dates are required for an index query")]
    EmptyIndexQuery,
    /// The query was abandoned because a newer one started.
    #[error("query superseded by a newer request")]
    Superseded,
    /// Strategy resolution failure.
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    /// Cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Network failure.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl From<FetchError> for ClientError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Endpoint(e) => Self::Endpoint(e),
            FetchError::Cache(e) => Self::Cache(e),
            FetchError::Superseded => Self::Superseded,
        }
    }
}

/// One top-level data query.
#[derive(Debug, Clone)]
pub struct GetDataQuery {
    /// Viewport region to cover.
    pub region: QueryRegion,
    /// Viewport zoom level.
    pub zoom: f64,
    /// Demographic filters; the client default when absent.
    pub filters: Option<Filters>,
    /// Data date; the currently selected date when absent.
    pub date: Option<String>,
}

impl GetDataQuery {
    /// Query for an arbitrary region.
    pub fn new(region: QueryRegion, zoom: f64) -> Self {
        Self {
            region,
            zoom,
            filters: None,
            date: None,
        }
    }

    /// Query for a single map point.
    pub fn point(lat: f64, lon: f64, zoom: f64) -> Self {
        Self::new(QueryRegion::Point { lat, lon }, zoom)
    }

    /// Query for a polygon given as a flat lat/lon coordinate list.
    pub fn polygon(coordinates: Vec<f64>, zoom: f64) -> Self {
        Self::new(QueryRegion::Polygon(coordinates), zoom)
    }

    /// Override the client's default filters.
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Override the selected date.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

/// A direct query for named cell indexes across dates, bypassing the
/// cache and strategy resolution.
#[derive(Debug, Clone)]
pub struct GetIndexesQuery {
    /// Cell indexes to fetch.
    pub indexes: Vec<String>,
    /// Dates to cross with the indexes; all available dates when absent.
    pub dates: Option<Vec<String>>,
    /// Demographic filters; the client default when absent.
    pub filters: Option<Filters>,
}

impl GetIndexesQuery {
    /// Query for the given cell indexes.
    pub fn new(indexes: Vec<String>) -> Self {
        Self {
            indexes,
            dates: None,
            filters: None,
        }
    }

    /// Restrict the query to specific dates.
    pub fn with_dates(mut self, dates: Vec<String>) -> Self {
        self.dates = Some(dates);
        self
    }

    /// Override the client's default filters.
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Client for the demographic data service.
///
/// Queries resolve against the local cache first and fetch only unknown
/// cells over the network; a new query supersedes the previous one,
/// cancelling its outstanding network operations.
pub struct GeodemoClient {
    config: ClientConfig,
    endpoint: Arc<dyn DataEndpoint>,
    resolver: StrategyResolver,
    scanner: CacheScanner,
    coordinator: FetchCoordinator,
    progress: ProgressReporter,
    hooks: Hooks,
    dates_available: Vec<String>,
    selected_index: Mutex<usize>,
    authorization_token: String,
}

impl GeodemoClient {
    /// Connect with an injected endpoint implementation.
    ///
    /// Fails synchronously with [`ClientError::MissingDomain`] when no
    /// domain is configured, then resolves both initialization endpoints
    /// before returning. The latest available date is selected.
    pub async fn connect(
        config: ClientConfig,
        tessellation: Arc<dyn Tessellation>,
        cache: Arc<dyn FeatureCache>,
        endpoint: Arc<dyn DataEndpoint>,
        hooks: Hooks,
    ) -> Result<Self, ClientError> {
        if config.domain.is_empty() {
            return Err(ClientError::MissingDomain);
        }

        let (mut dates, authorization_token) =
            tokio::try_join!(endpoint.dates_available(), endpoint.authorization_token())?;
        dates.sort_by(|a, b| b.cmp(a));
        if dates.is_empty() {
            return Err(ClientError::NoDatesAvailable);
        }
        info!(
            latest = %dates[0],
            dates = dates.len(),
            "geodemo client initialized"
        );

        let progress = ProgressReporter::new(config.debounce_window);
        let resolver =
            StrategyResolver::new(tessellation, config.min_cells, config.max_cells);
        let scanner = CacheScanner::new(Arc::clone(&cache));
        let coordinator = FetchCoordinator::new(
            cache,
            Arc::clone(&endpoint),
            progress.clone(),
            config.batch_size,
            config.negative_cache,
        );

        Ok(Self {
            config,
            endpoint,
            resolver,
            scanner,
            coordinator,
            progress,
            hooks,
            dates_available: dates,
            selected_index: Mutex::new(0),
            authorization_token,
        })
    }

    /// Connect over HTTP against the configured domain.
    pub async fn connect_http(
        config: ClientConfig,
        tessellation: Arc<dyn Tessellation>,
        cache: Arc<dyn FeatureCache>,
        hooks: Hooks,
    ) -> Result<Self, ClientError> {
        if config.domain.is_empty() {
            return Err(ClientError::MissingDomain);
        }
        let endpoint = Arc::new(HttpEndpoint::new(&config.domain)?);
        Self::connect(config, tessellation, cache, endpoint, hooks).await
    }

    /// Dates the service has data for, latest first.
    pub fn dates_available(&self) -> &[String] {
        &self.dates_available
    }

    /// The currently selected date.
    pub fn selected_date(&self) -> String {
        let index = *self.selected_index.lock().unwrap();
        self.dates_available[index].clone()
    }

    /// Advance the selected date, wrapping around at the end of the list.
    pub fn next_date(&self) {
        let mut index = self.selected_index.lock().unwrap();
        *index = (*index + 1) % self.dates_available.len();
    }

    /// Step the selected date back, wrapping around at the start.
    pub fn previous_date(&self) {
        let mut index = self.selected_index.lock().unwrap();
        *index = index
            .checked_sub(1)
            .unwrap_or(self.dates_available.len() - 1);
    }

    /// Short-lived authorization token for the voice collaborator.
    pub fn authorization_token(&self) -> &str {
        &self.authorization_token
    }

    /// Subscribe to debounced progress for the current query generation.
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    /// Fetch the feature collection covering a query region and date.
    ///
    /// Supersedes any query still in flight, resolves the strategy, scans
    /// the cache, and fetches only the unknown keys in cancellable
    /// batches. Returns the merged collection of cached and fetched
    /// features; a query abandoned mid-flight resolves to
    /// [`ClientError::Superseded`].
    pub async fn get_data(&self, query: GetDataQuery) -> Result<FeatureCollection, ClientError> {
        self.hooks.notify_before_get_data();

        // Supersession happens strictly before the new strategy is
        // computed: the previous generation's batches are already
        // cancelled when this query starts doing work.
        let generation = self.coordinator.begin_generation();

        let date = query
            .date
            .clone()
            .unwrap_or_else(|| self.selected_date());
        let filters = query
            .filters
            .clone()
            .unwrap_or_else(|| self.config.filters.clone());

        self.hooks.notify_before_strategy();
        let strategy = self.resolver.resolve(&query.region, query.zoom, &date)?;
        self.hooks.notify_after_strategy(&strategy);

        let accumulator = Accumulator::new(strategy.len());
        let outcome = self
            .scanner
            .scan(&strategy, &generation, &accumulator, &self.progress)
            .await?;

        // Dry-run pass over cached features: hooks observing "data became
        // available" fire uniformly whether the data came from cache or
        // network, without re-writing storage.
        self.coordinator
            .cache_features(&outcome.known, None, None, &self.hooks)
            .await?;

        self.hooks.notify_before_supplementary(&outcome.known);

        if outcome.is_fully_cached() {
            // A scan that straddled a supersession must not claim
            // completion for the newer generation.
            if !self.coordinator.is_current(&generation) {
                return Err(ClientError::Superseded);
            }
            self.hooks.notify_after_supplementary(&outcome.known);
            return Ok(FeatureCollection::new(accumulator.into_features()));
        }

        let request = DataRequest {
            indexes: Vec::new(),
            filters,
            coordinates: Some(query.region.coordinate_string()),
            zoom: Some(query.zoom),
            coverage: true,
        };
        self.coordinator
            .fetch(
                &outcome.unknown,
                &request,
                &generation,
                &accumulator,
                &self.hooks,
            )
            .await?;

        let collection = FeatureCollection::new(accumulator.into_features());
        self.hooks.notify_after_get_data(&collection);
        Ok(collection)
    }

    /// Fetch named cell indexes across dates, bypassing cache and
    /// strategy resolution.
    ///
    /// Fails fast with [`ClientError::EmptyIndexQuery`] before any
    /// network activity when the index or date list is empty. Pages are
    /// fetched concurrently.
    pub async fn get_indexes(
        &self,
        query: GetIndexesQuery,
    ) -> Result<FeatureCollection, ClientError> {
        let dates = query
            .dates
            .clone()
            .unwrap_or_else(|| self.dates_available.clone());
        if query.indexes.is_empty() || dates.is_empty() {
            return Err(ClientError::EmptyIndexQuery);
        }
        let filters = query
            .filters
            .clone()
            .unwrap_or_else(|| self.config.filters.clone());

        let composite: Vec<CompositeKey> = query
            .indexes
            .iter()
            .flat_map(|index| dates.iter().map(move |date| CompositeKey::new(index, date)))
            .collect();

        let template = DataRequest {
            indexes: Vec::new(),
            filters,
            coordinates: None,
            zoom: None,
            coverage: false,
        };
        let pages = composite
            .chunks(self.config.index_page_size)
            .map(|page| {
                let request = template.for_batch(page);
                let endpoint = Arc::clone(&self.endpoint);
                async move { endpoint.fetch_indexes(&request).await }
            });
        let envelopes = try_join_all(pages).await?;

        let features = envelopes
            .into_iter()
            .flat_map(|envelope| envelope.features)
            .collect();
        Ok(FeatureCollection::new(features))
    }

    /// Look up points of interest by the service's query parameters.
    pub async fn points_of_interest(
        &self,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, ClientError> {
        Ok(self.endpoint.lookup("poi", params).await?)
    }

    /// Look up an address.
    pub async fn address(
        &self,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, ClientError> {
        Ok(self.endpoint.lookup("address", params).await?)
    }

    /// Fuzzy search across the service's known places.
    pub async fn fuzzy(
        &self,
        params: &[(String, String)],
    ) -> Result<serde_json::Value, ClientError> {
        Ok(self.endpoint.lookup("fuzzy", params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryFeatureCache;
    use crate::feature::ResponseEnvelope;
    use crate::tessellation::{CellId, Resolution, TessellationError};
    use futures::future::BoxFuture;

    struct StubTessellation;

    impl Tessellation for StubTessellation {
        fn cell_for_point(
            &self,
            _lat: f64,
            _lon: f64,
            _resolution: Resolution,
        ) -> Result<CellId, TessellationError> {
            Ok("cell".to_string())
        }

        fn cells_for_polygon(
            &self,
            _ring: &[(f64, f64)],
            _resolution: Resolution,
        ) -> Result<Vec<CellId>, TessellationError> {
            Ok(vec!["cell".to_string()])
        }
    }

    struct StubEndpoint {
        dates: Vec<String>,
    }

    impl DataEndpoint for StubEndpoint {
        fn fetch_indexes<'a>(
            &'a self,
            request: &'a DataRequest,
        ) -> BoxFuture<'a, Result<ResponseEnvelope, EndpointError>> {
            Box::pin(async move {
                Ok(ResponseEnvelope {
                    envelope_type: "FeatureCollection".to_string(),
                    features: request
                        .indexes
                        .iter()
                        .map(|key| crate::feature::testutil::sample_feature(key.as_str()))
                        .collect(),
                    metadata: None,
                })
            })
        }

        fn dates_available(&self) -> BoxFuture<'_, Result<Vec<String>, EndpointError>> {
            Box::pin(async move { Ok(self.dates.clone()) })
        }

        fn authorization_token(&self) -> BoxFuture<'_, Result<String, EndpointError>> {
            Box::pin(async { Ok("token".to_string()) })
        }

        fn lookup<'a>(
            &'a self,
            _resource: &'a str,
            _params: &'a [(String, String)],
        ) -> BoxFuture<'a, Result<serde_json::Value, EndpointError>> {
            Box::pin(async { Ok(serde_json::Value::Null) })
        }
    }

    async fn client(dates: &[&str]) -> GeodemoClient {
        GeodemoClient::connect(
            ClientConfig::new("https://api.example.com"),
            Arc::new(StubTessellation),
            Arc::new(MemoryFeatureCache::new()),
            Arc::new(StubEndpoint {
                dates: dates.iter().map(|d| d.to_string()).collect(),
            }),
            Hooks::new(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn missing_domain_fails_construction() {
        let result = GeodemoClient::connect(
            ClientConfig::new(""),
            Arc::new(StubTessellation),
            Arc::new(MemoryFeatureCache::new()),
            Arc::new(StubEndpoint { dates: vec![] }),
            Hooks::new(),
        )
        .await;
        assert!(matches!(result, Err(ClientError::MissingDomain)));
    }

    #[tokio::test]
    async fn empty_date_list_fails_construction() {
        let result = GeodemoClient::connect(
            ClientConfig::new("https://api.example.com"),
            Arc::new(StubTessellation),
            Arc::new(MemoryFeatureCache::new()),
            Arc::new(StubEndpoint { dates: vec![] }),
            Hooks::new(),
        )
        .await;
        assert!(matches!(result, Err(ClientError::NoDatesAvailable)));
    }

    #[tokio::test]
    async fn latest_date_selected_at_connect() {
        let client = client(&["2022-12-01", "2023-01-01", "2022-11-01"]).await;
        assert_eq!(client.selected_date(), "2023-01-01");
        assert_eq!(
            client.dates_available(),
            &["2023-01-01", "2022-12-01", "2022-11-01"]
        );
    }

    #[tokio::test]
    async fn date_navigation_wraps_around() {
        let client = client(&["2023-01-01", "2022-12-01"]).await;

        client.next_date();
        assert_eq!(client.selected_date(), "2022-12-01");
        client.next_date();
        assert_eq!(client.selected_date(), "2023-01-01");

        client.previous_date();
        assert_eq!(client.selected_date(), "2022-12-01");
        client.previous_date();
        assert_eq!(client.selected_date(), "2023-01-01");
    }

    #[tokio::test]
    async fn get_indexes_fails_fast_on_empty_input() {
        let client = client(&["2023-01-01"]).await;

        let result = client.get_indexes(GetIndexesQuery::new(vec![])).await;
        assert!(matches!(result, Err(ClientError::EmptyIndexQuery)));

        let result = client
            .get_indexes(
                GetIndexesQuery::new(vec!["cell".to_string()]).with_dates(vec![]),
            )
            .await;
        assert!(matches!(result, Err(ClientError::EmptyIndexQuery)));
    }

    #[tokio::test]
    async fn get_indexes_crosses_indexes_with_dates() {
        let client = client(&["2023-01-01", "2022-12-01"]).await;

        let collection = client
            .get_indexes(GetIndexesQuery::new(vec![
                "a".to_string(),
                "b".to_string(),
            ]))
            .await
            .unwrap();

        let mut indexes: Vec<&str> = collection
            .features
            .iter()
            .map(|feature| feature.index())
            .collect();
        indexes.sort_unstable();
        assert_eq!(
            indexes,
            vec![
                "a2022-12-01",
                "a2023-01-01",
                "b2022-12-01",
                "b2023-01-01"
            ]
        );
    }
}
