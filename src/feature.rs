//! GeoJSON-style feature types exchanged with the data endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Properties attached to a [`Feature`].
///
/// `index` is the composite key (cell identifier concatenated with a date)
/// under which the feature is cached; every other property is carried
/// opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    /// Composite key identifying this feature's (cell, date) pair.
    pub index: String,
    /// Remaining demographic properties, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One geospatial demographic record.
///
/// Created by the data endpoint, stored by the cache, and referenced (never
/// mutated) by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// GeoJSON type tag, normally `"Feature"`.
    #[serde(rename = "type", default = "feature_type")]
    pub feature_type: String,
    /// Geometry, carried opaquely.
    #[serde(default)]
    pub geometry: Value,
    /// Feature properties including the composite key.
    pub properties: FeatureProperties,
}

fn feature_type() -> String {
    "Feature".to_string()
}

impl Feature {
    /// The composite key this feature is cached under.
    pub fn index(&self) -> &str {
        &self.properties.index
    }
}

/// The merged result of one data query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// GeoJSON type tag, always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub collection_type: String,
    /// Features in completion order.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Wrap a feature list in a collection envelope.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            collection_type: "FeatureCollection".to_string(),
            features,
        }
    }

    /// Number of features in the collection.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Server-side accounting attached to a batch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    /// Every composite index the server was asked for in this request.
    ///
    /// Indexes listed here but absent from the returned features had no
    /// data and become negative cache entries.
    #[serde(rename = "queryIndexes")]
    pub query_indexes: Vec<String>,
}

/// Feature-collection envelope returned by the data endpoint.
///
/// `metadata` is absent for custom queries that bypass the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// GeoJSON type tag.
    #[serde(rename = "type", default)]
    pub envelope_type: String,
    /// Features found for the requested indexes.
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Query accounting; drives negative cache writes when present.
    #[serde(default)]
    pub metadata: Option<EnvelopeMetadata>,
}
