use geo_types::Point;
use tracing::{instrument, warn};

use crate::convert;
use crate::error::TrackError;
use crate::store::GeoStore;

/// Proximity query: the store ranks documents by increasing spherical
/// distance (its rule for multi-geometry documents — which is why no scalar
/// distance appears in the output), this converts each one back to a track
/// document. The result set is capped at `limit`, never unbounded.
///
/// One unconvertible stored document is logged and skipped; it never fails
/// the whole query.
#[instrument(skip(store))]
pub async fn nearest_tracks<S: GeoStore>(
    store: &S,
    origin: Point<f64>,
    limit: usize,
) -> Result<Vec<String>, TrackError> {
    let documents = store.find_nearest(origin, limit).await?;
    let mut tracks = Vec::with_capacity(documents.len());
    for document in &documents {
        match convert::to_track_document(document) {
            Ok(text) => tracks.push(text),
            Err(err) => warn!(error = %err, "skipping stored document that failed conversion"),
        }
    }
    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryTrackStore;
    use geojson::{Feature, FeatureCollection, Geometry, JsonObject};

    fn named_line(lon: f64, lat: f64, name: &str) -> FeatureCollection {
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), name.into());
        FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::LineString(vec![
                    vec![lon, lat],
                    vec![lon + 0.01, lat + 0.01],
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }],
            foreign_members: None,
        }
    }

    #[tokio::test]
    async fn results_are_gpx_in_increasing_distance() {
        let store = MemoryTrackStore::new();
        store.insert(&named_line(13.4, 52.5, "far")).await.unwrap();
        store.insert(&named_line(11.0, 48.0, "near")).await.unwrap();

        let tracks = nearest_tracks(&store, Point::new(11.0, 48.0), 100)
            .await
            .unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].contains("near"));
        assert!(tracks[1].contains("far"));
        assert!(tracks[0].contains("<gpx"));
    }

    #[tokio::test]
    async fn empty_store_is_an_empty_response() {
        let store = MemoryTrackStore::new();
        let tracks = nearest_tracks(&store, Point::new(0.0, 0.0), 100)
            .await
            .unwrap();
        assert!(tracks.is_empty());
    }

    #[tokio::test]
    async fn result_set_is_truncated_at_the_cap() {
        let store = MemoryTrackStore::new();
        for i in 0..4 {
            store
                .insert(&named_line(11.0 + f64::from(i) * 0.1, 48.0, "doc"))
                .await
                .unwrap();
        }
        let tracks = nearest_tracks(&store, Point::new(11.0, 48.0), 2)
            .await
            .unwrap();
        assert_eq!(tracks.len(), 2);
    }

    #[tokio::test]
    async fn one_bad_document_does_not_abort_the_query() {
        let store = MemoryTrackStore::new();
        store.insert(&named_line(11.0, 48.0, "good")).await.unwrap();
        // A stored document with a geometry the converter does not handle.
        let bad = FeatureCollection {
            bbox: None,
            features: vec![Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::Polygon(vec![vec![
                    vec![11.0, 48.2],
                    vec![11.1, 48.2],
                    vec![11.1, 48.3],
                    vec![11.0, 48.2],
                ]]))),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        };
        store.insert(&bad).await.unwrap();

        let tracks = nearest_tracks(&store, Point::new(11.0, 48.0), 100)
            .await
            .unwrap();
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].contains("good"));
    }
}
