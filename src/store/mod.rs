//! Port to the geospatial document store.
//!
//! The store owns geometry uniqueness and spherical nearest-neighbor ranking;
//! this crate only shapes inserts and queries. Concurrency control is the
//! store's as well: one client is opened at startup and shared by all
//! requests without external locking.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use geo_types::Point;
use geojson::FeatureCollection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a document with identical geometry already exists")]
    DuplicateGeometry,
    #[error("store backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Backend(format!("document serialization failed: {err}"))
    }
}

#[async_trait]
pub trait GeoStore: Send + Sync {
    /// Append exactly one document. Identical geometry under the store's
    /// uniqueness constraint is `DuplicateGeometry`, never a second copy.
    async fn insert(&self, document: &FeatureCollection) -> Result<(), StoreError>;

    /// Documents ordered by increasing great-circle distance from `origin`,
    /// at most `limit` of them. An empty store yields an empty list.
    async fn find_nearest(
        &self,
        origin: Point<f64>,
        limit: usize,
    ) -> Result<Vec<FeatureCollection>, StoreError>;
}
