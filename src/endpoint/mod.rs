//! Data endpoint abstraction and HTTP implementation.
//!
//! The orchestrator talks to the demographic data service through the
//! [`DataEndpoint`] trait so tests can inject mock endpoints. The real
//! implementation, [`HttpEndpoint`], issues JSON requests over reqwest.

use crate::config::Filters;
use crate::feature::ResponseEnvelope;
use crate::strategy::CompositeKey;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Errors surfaced by a data endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The configured domain could not be parsed as a base URL.
    #[error("invalid endpoint url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Failed to construct the HTTP client.
    #[error("http client error: {0}")]
    HttpClient(String),
    /// Transport-level request failure.
    #[error("request failed: {0}")]
    Request(String),
    /// Non-success HTTP status.
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
    /// Response body that does not parse as the expected JSON shape.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

/// One batched data request.
///
/// `coordinates`, `zoom` and `coverage` are carried only for top-level
/// viewport queries; direct index queries send filters and indexes alone.
#[derive(Debug, Clone)]
pub struct DataRequest {
    /// Composite indexes to fetch, comma-joined on the wire.
    pub indexes: Vec<CompositeKey>,
    /// Region-independent demographic filters.
    pub filters: Filters,
    /// Raw query geometry for the top-level request, if any.
    pub coordinates: Option<String>,
    /// Viewport zoom, serialized with two decimals.
    pub zoom: Option<f64>,
    /// Whether the server should report coverage accounting.
    pub coverage: bool,
}

impl DataRequest {
    /// The same request narrowed to one batch of indexes.
    pub fn for_batch(&self, batch: &[CompositeKey]) -> Self {
        Self {
            indexes: batch.to_vec(),
            ..self.clone()
        }
    }
}

/// Network contract of the demographic data service.
pub trait DataEndpoint: Send + Sync {
    /// Fetch the features for a batch of composite indexes.
    fn fetch_indexes<'a>(
        &'a self,
        request: &'a DataRequest,
    ) -> BoxFuture<'a, Result<ResponseEnvelope, EndpointError>>;

    /// List of dates the service has data for.
    fn dates_available(&self) -> BoxFuture<'_, Result<Vec<String>, EndpointError>>;

    /// Short-lived authorization token for the voice collaborator.
    fn authorization_token(&self) -> BoxFuture<'_, Result<String, EndpointError>>;

    /// Plain GET against a named resource (`poi`, `address`, `fuzzy`).
    fn lookup<'a>(
        &'a self,
        resource: &'a str,
        params: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<serde_json::Value, EndpointError>>;
}

/// Default request timeout.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// HTTP implementation of [`DataEndpoint`] backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    base: Url,
}

impl HttpEndpoint {
    /// Create an endpoint for the given service domain.
    pub fn new(domain: &str) -> Result<Self, EndpointError> {
        let base = Url::parse(domain).map_err(|e| EndpointError::InvalidUrl {
            url: domain.to_string(),
            reason: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("geodemo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EndpointError::HttpClient(e.to_string()))?;
        Ok(Self { client, base })
    }

    /// Build the data query URL for a request.
    fn data_url(&self, request: &DataRequest) -> Url {
        let mut url = self.base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(coordinates) = &request.coordinates {
                pairs.append_pair("coordinates", coordinates);
            }
            if let Some(zoom) = request.zoom {
                pairs.append_pair("zoom", &format!("{zoom:.2}"));
            }
            pairs.append_pair("age", &request.filters.age);
            pairs.append_pair("gender", &request.filters.gender);
            pairs.append_pair("ethnicity", &request.filters.ethnicity);
            pairs.append_pair("income", &request.filters.income);
            if request.coverage {
                pairs.append_pair("coverage", "true");
            }
            let indexes = request
                .indexes
                .iter()
                .map(CompositeKey::as_str)
                .collect::<Vec<_>>()
                .join(",");
            pairs.append_pair("indexes", &indexes);
        }
        url
    }

    /// Build a URL for a sub-resource of the service.
    fn resource_url(
        &self,
        resource: &str,
        params: &[(String, String)],
    ) -> Result<Url, EndpointError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| EndpointError::InvalidUrl {
                url: self.base.to_string(),
                reason: "cannot be a base url".to_string(),
            })?
            .pop_if_empty()
            .push(resource);
        for (name, value) in params {
            url.query_pairs_mut().append_pair(name, value);
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, EndpointError> {
        debug!(url = %url, "endpoint request");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| EndpointError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "endpoint returned error status");
            return Err(EndpointError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| EndpointError::MalformedBody(e.to_string()))
    }
}

impl DataEndpoint for HttpEndpoint {
    fn fetch_indexes<'a>(
        &'a self,
        request: &'a DataRequest,
    ) -> BoxFuture<'a, Result<ResponseEnvelope, EndpointError>> {
        Box::pin(async move { self.get_json(self.data_url(request)).await })
    }

    fn dates_available(&self) -> BoxFuture<'_, Result<Vec<String>, EndpointError>> {
        Box::pin(async move {
            let url = self.resource_url("datesAvailable", &[])?;
            self.get_json(url).await
        })
    }

    fn authorization_token(&self) -> BoxFuture<'_, Result<String, EndpointError>> {
        Box::pin(async move {
            let url = self.resource_url("cognitive", &[])?;
            self.get_json(url).await
        })
    }

    fn lookup<'a>(
        &'a self,
        resource: &'a str,
        params: &'a [(String, String)],
    ) -> BoxFuture<'a, Result<serde_json::Value, EndpointError>> {
        Box::pin(async move {
            let url = self.resource_url(resource, params)?;
            self.get_json(url).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> HttpEndpoint {
        HttpEndpoint::new("https://api.example.com").unwrap()
    }

    fn keys(names: &[&str]) -> Vec<CompositeKey> {
        names
            .iter()
            .map(|name| CompositeKey::new(name, "2023-01-01"))
            .collect()
    }

    #[test]
    fn invalid_domain_is_rejected() {
        let result = HttpEndpoint::new("not a url");
        assert!(matches!(result, Err(EndpointError::InvalidUrl { .. })));
    }

    #[test]
    fn data_url_carries_viewport_parameters() {
        let request = DataRequest {
            indexes: keys(&["a", "b"]),
            filters: Filters::default(),
            coordinates: Some("39.0977,-94.5786".to_string()),
            zoom: Some(0.5),
            coverage: true,
        };

        let url = endpoint().data_url(&request);
        assert_eq!(
            url.query(),
            Some(
                "coordinates=39.0977%2C-94.5786&zoom=0.50&age=default&gender=default\
                 &ethnicity=default&income=default&coverage=true\
                 &indexes=a2023-01-01%2Cb2023-01-01"
            )
        );
    }

    #[test]
    fn index_query_url_omits_viewport_parameters() {
        let request = DataRequest {
            indexes: keys(&["a"]),
            filters: Filters::default(),
            coordinates: None,
            zoom: None,
            coverage: false,
        };

        let url = endpoint().data_url(&request);
        let query = url.query().unwrap();
        assert!(!query.contains("coordinates"));
        assert!(!query.contains("zoom"));
        assert!(!query.contains("coverage"));
        assert!(query.contains("indexes=a2023-01-01"));
    }

    #[test]
    fn resource_url_joins_path_segment() {
        let url = endpoint()
            .resource_url(
                "poi",
                &[("name".to_string(), "union station".to_string())],
            )
            .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/poi?name=union+station");
    }
}
