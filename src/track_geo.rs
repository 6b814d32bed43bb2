use geo::HaversineDistance;
use geo_types::Point;
use geojson::{Feature, FeatureCollection, Geometry};

/// Iterate every coordinate of a geojson value as a point.
///
/// Positions are read directly rather than through geo-types conversions so
/// that three-element positions (with elevation) are handled, and so that a
/// stored document with a malformed position degrades to "no point" instead
/// of failing the whole traversal.
pub trait Points {
    fn points(&self) -> Box<dyn Iterator<Item = Point<f64>> + '_ + Send>;
}

fn position_point(position: &[f64]) -> Option<Point<f64>> {
    match position {
        [lon, lat, ..] => Some(Point::new(*lon, *lat)),
        _ => None,
    }
}

impl Points for geojson::Value {
    fn points(&self) -> Box<dyn Iterator<Item = Point<f64>> + '_ + Send> {
        match self {
            geojson::Value::Point(position) => {
                Box::new(position_point(position).into_iter())
            }
            geojson::Value::MultiPoint(positions) | geojson::Value::LineString(positions) => {
                Box::new(positions.iter().filter_map(|p| position_point(p)))
            }
            geojson::Value::MultiLineString(lines) | geojson::Value::Polygon(lines) => {
                Box::new(lines.iter().flatten().filter_map(|p| position_point(p)))
            }
            geojson::Value::MultiPolygon(polygons) => Box::new(
                polygons
                    .iter()
                    .flatten()
                    .flatten()
                    .filter_map(|p| position_point(p)),
            ),
            geojson::Value::GeometryCollection(geometries) => {
                Box::new(geometries.iter().flat_map(|g| g.points()))
            }
        }
    }
}

impl Points for Geometry {
    fn points(&self) -> Box<dyn Iterator<Item = Point<f64>> + '_ + Send> {
        self.value.points()
    }
}

impl Points for Feature {
    fn points(&self) -> Box<dyn Iterator<Item = Point<f64>> + '_ + Send> {
        match &self.geometry {
            Some(geometry) => geometry.points(),
            None => Box::new(std::iter::empty()),
        }
    }
}

impl Points for FeatureCollection {
    fn points(&self) -> Box<dyn Iterator<Item = Point<f64>> + '_ + Send> {
        Box::new(self.features.iter().flat_map(|f| f.points()))
    }
}

/// Canonical text form of a collection's geometry sequence.
///
/// This is the value the store's uniqueness constraint indexes: two documents
/// with the same geometry collide here no matter how their labels differ.
pub fn canonical_geometry(collection: &FeatureCollection) -> Result<String, serde_json::Error> {
    let geometries: Vec<Option<&Geometry>> = collection
        .features
        .iter()
        .map(|feature| feature.geometry.as_ref())
        .collect();
    serde_json::to_string(&geometries)
}

/// Great-circle distance in metres from `origin` to the closest coordinate of
/// the collection, or `None` when the collection carries no coordinates.
///
/// This is the ranking rule for multi-geometry documents: the document's
/// distance is its nearest geometry's distance, and no single per-document
/// scalar is reported back to callers.
pub fn nearest_distance(collection: &FeatureCollection, origin: Point<f64>) -> Option<f64> {
    collection
        .points()
        .map(|point| origin.haversine_distance(&point))
        .min_by(|a, b| a.total_cmp(b))
}
