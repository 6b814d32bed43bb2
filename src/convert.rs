use geo_types::Point;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use gpx::{Gpx, GpxVersion};
use thiserror::Error;

/// Written into the gpx root of every converted response document.
const CREATOR: &str = "tracknear-server";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("document is not well-formed GPX markup: {0}")]
    Markup(gpx::errors::GpxError),
    #[error("feature {0} has no geometry")]
    MissingGeometry(usize),
    #[error("feature {0} has unsupported geometry type {1}")]
    UnsupportedGeometry(usize, &'static str),
    #[error("feature {0} carries a position with fewer than two coordinates")]
    MalformedPosition(usize),
    #[error("failed to serialize track document: {0}")]
    Write(gpx::errors::GpxError),
    #[error("serialized track document is not UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Forward conversion: GPX text to the stored feature-collection form.
///
/// Tracks become one feature each (a MultiLineString with one line per
/// non-empty segment); waypoints become Point features and routes LineString
/// features. Elevation goes into third positions, timestamps into a best-effort
/// `coordTimes` property. Features without any coordinate are never emitted.
///
/// Fails only on malformed markup. Callers run the grammar check first, so a
/// failure here means grammar and parser disagree about the document.
pub fn to_feature_collection(document: &str) -> Result<FeatureCollection, ConversionError> {
    let parsed = gpx::read(document.as_bytes()).map_err(ConversionError::Markup)?;
    let mut features = Vec::new();
    for waypoint in &parsed.waypoints {
        features.push(waypoint_feature(waypoint));
    }
    for route in &parsed.routes {
        if !route.points.is_empty() {
            features.push(route_feature(route));
        }
    }
    for track in &parsed.tracks {
        if let Some(feature) = track_feature(track) {
            features.push(feature);
        }
    }
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Reverse conversion: a stored feature collection back to GPX text.
///
/// Always GPX 1.1, whatever version the document was ingested as. Succeeds
/// for anything `to_feature_collection` produced; degrades by omitting labels
/// a feature never had.
pub fn to_track_document(collection: &FeatureCollection) -> Result<String, ConversionError> {
    let mut output = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.to_string()),
        metadata: None,
        waypoints: vec![],
        tracks: vec![],
        routes: vec![],
    };
    for (index, feature) in collection.features.iter().enumerate() {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or(ConversionError::MissingGeometry(index))?;
        match &geometry.value {
            geojson::Value::Point(position) => {
                let mut waypoint = waypoint_at(index, position)?;
                waypoint.name = feature_label(feature, "name");
                waypoint.description = feature_label(feature, "desc");
                output.waypoints.push(waypoint);
            }
            geojson::Value::LineString(line) => {
                output
                    .tracks
                    .push(track_from(index, std::slice::from_ref(line), feature)?);
            }
            geojson::Value::MultiLineString(lines) => {
                output.tracks.push(track_from(index, lines, feature)?);
            }
            other => {
                return Err(ConversionError::UnsupportedGeometry(
                    index,
                    geometry_kind(other),
                ))
            }
        }
    }
    let mut buffer = Vec::new();
    gpx::write(&output, &mut buffer).map_err(ConversionError::Write)?;
    Ok(String::from_utf8(buffer)?)
}

/// Title/description extraction. A `name`/`desc` property is used verbatim
/// (non-strings rendered as JSON text); a properties mapping without the key
/// falls back to the entire mapping, serialized — a track is never left
/// unlabeled when its document carried any properties at all. Absent or empty
/// properties omit the field.
fn feature_label(feature: &Feature, key: &str) -> Option<String> {
    let properties = feature.properties.as_ref()?;
    match properties.get(key) {
        Some(serde_json::Value::String(text)) => Some(text.clone()),
        Some(other) => Some(other.to_string()),
        None if properties.is_empty() => None,
        None => serde_json::to_string(properties).ok(),
    }
}

fn position(waypoint: &gpx::Waypoint) -> Vec<f64> {
    let point = waypoint.point();
    match waypoint.elevation {
        Some(elevation) => vec![point.x(), point.y(), elevation],
        None => vec![point.x(), point.y()],
    }
}

fn insert_label(properties: &mut JsonObject, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        properties.insert(key.to_string(), value.clone().into());
    }
}

fn feature(value: geojson::Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: None,
        properties: if properties.is_empty() {
            None
        } else {
            Some(properties)
        },
        foreign_members: None,
    }
}

fn waypoint_feature(waypoint: &gpx::Waypoint) -> Feature {
    let mut properties = JsonObject::new();
    insert_label(&mut properties, "name", &waypoint.name);
    insert_label(&mut properties, "desc", &waypoint.description);
    insert_label(&mut properties, "cmt", &waypoint.comment);
    insert_label(&mut properties, "sym", &waypoint.symbol);
    feature(geojson::Value::Point(position(waypoint)), properties)
}

fn route_feature(route: &gpx::Route) -> Feature {
    let mut properties = JsonObject::new();
    insert_label(&mut properties, "name", &route.name);
    insert_label(&mut properties, "desc", &route.description);
    insert_label(&mut properties, "cmt", &route.comment);
    insert_label(&mut properties, "type", &route.type_);
    let line = route.points.iter().map(position).collect();
    feature(geojson::Value::LineString(line), properties)
}

fn track_feature(track: &gpx::Track) -> Option<Feature> {
    let segments: Vec<&gpx::TrackSegment> = track
        .segments
        .iter()
        .filter(|segment| !segment.points.is_empty())
        .collect();
    // A track with no points would break the geometry invariant; leave it out.
    if segments.is_empty() {
        return None;
    }
    let lines: Vec<Vec<Vec<f64>>> = segments
        .iter()
        .map(|segment| segment.points.iter().map(position).collect())
        .collect();

    let mut properties = JsonObject::new();
    insert_label(&mut properties, "name", &track.name);
    insert_label(&mut properties, "desc", &track.description);
    insert_label(&mut properties, "cmt", &track.comment);
    insert_label(&mut properties, "type", &track.type_);

    let mut any_time = false;
    let times: Vec<serde_json::Value> = segments
        .iter()
        .map(|segment| {
            segment
                .points
                .iter()
                .map(|point| match point.time.as_ref().and_then(|t| t.format().ok()) {
                    Some(stamp) => {
                        any_time = true;
                        serde_json::Value::String(stamp)
                    }
                    None => serde_json::Value::Null,
                })
                .collect::<Vec<_>>()
                .into()
        })
        .collect();
    if any_time {
        properties.insert("coordTimes".to_string(), serde_json::Value::Array(times));
    }

    Some(feature(geojson::Value::MultiLineString(lines), properties))
}

fn track_from(
    index: usize,
    lines: &[Vec<Vec<f64>>],
    feature: &Feature,
) -> Result<gpx::Track, ConversionError> {
    let mut track = gpx::Track {
        name: feature_label(feature, "name"),
        comment: None,
        description: feature_label(feature, "desc"),
        source: None,
        links: vec![],
        type_: None,
        number: None,
        segments: vec![],
    };
    for line in lines {
        let points = line
            .iter()
            .map(|position| waypoint_at(index, position))
            .collect::<Result<_, _>>()?;
        track.segments.push(gpx::TrackSegment { points });
    }
    Ok(track)
}

fn waypoint_at(index: usize, position: &[f64]) -> Result<gpx::Waypoint, ConversionError> {
    let [lon, lat, rest @ ..] = position else {
        return Err(ConversionError::MalformedPosition(index));
    };
    let mut waypoint = gpx::Waypoint::new(Point::new(*lon, *lat));
    waypoint.elevation = rest.first().copied();
    Ok(waypoint)
}

fn geometry_kind(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
