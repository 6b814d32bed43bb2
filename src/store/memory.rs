//! Fixture store client with the same contract as the backing database:
//! unique canonical geometry, results in increasing spherical distance.
//! Used by the test suite and for database-free local development.

use async_trait::async_trait;
use geo_types::Point;
use geojson::FeatureCollection;
use tokio::sync::RwLock;

use super::{GeoStore, StoreError};
use crate::track_geo::{canonical_geometry, nearest_distance};

struct StoredDocument {
    canonical: String,
    collection: FeatureCollection,
}

#[derive(Default)]
pub struct MemoryTrackStore {
    documents: RwLock<Vec<StoredDocument>>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeoStore for MemoryTrackStore {
    async fn insert(&self, document: &FeatureCollection) -> Result<(), StoreError> {
        let canonical = canonical_geometry(document)?;
        let mut documents = self.documents.write().await;
        if documents.iter().any(|stored| stored.canonical == canonical) {
            return Err(StoreError::DuplicateGeometry);
        }
        documents.push(StoredDocument {
            canonical,
            collection: document.clone(),
        });
        Ok(())
    }

    async fn find_nearest(
        &self,
        origin: Point<f64>,
        limit: usize,
    ) -> Result<Vec<FeatureCollection>, StoreError> {
        let documents = self.documents.read().await;
        let mut ranked: Vec<(f64, &StoredDocument)> = documents
            .iter()
            .filter_map(|stored| {
                nearest_distance(&stored.collection, origin).map(|distance| (distance, stored))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(ranked
            .into_iter()
            .take(limit)
            .map(|(_, stored)| stored.collection.clone())
            .collect())
    }
}
