use geo_types::Point;

use crate::error::TrackError;

pub const LAT_MIN: f64 = -90.0;
pub const LAT_MAX: f64 = 90.0;
pub const LON_MIN: f64 = -180.0;
pub const LON_MAX: f64 = 180.0;

/// Whether a latitude/longitude pair lies within the WGS84 coordinate bounds.
pub fn in_bounds(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (LAT_MIN..=LAT_MAX).contains(&lat)
        && (LON_MIN..=LON_MAX).contains(&lon)
}

/// Parse raw latitude/longitude path tokens into a point.
///
/// The returned point is ordered (longitude, latitude): the geometry index
/// stores coordinates in that order, and the inversion happens here, once, at
/// the edge.
pub fn parse_lat_lon(lat_raw: &str, lon_raw: &str) -> Result<Point<f64>, TrackError> {
    let malformed = || TrackError::Input(format!("malformed input: lat {lat_raw} lon {lon_raw}"));
    let lat: f64 = lat_raw.trim().parse().map_err(|_| malformed())?;
    let lon: f64 = lon_raw.trim().parse().map_err(|_| malformed())?;
    if !in_bounds(lat, lon) {
        return Err(malformed());
    }
    Ok(Point::new(lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_pair_is_returned_lon_first() {
        let point = parse_lat_lon("48.137", "11.575").unwrap();
        assert_eq!(point.x(), 11.575);
        assert_eq!(point.y(), 48.137);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(parse_lat_lon("90", "180").is_ok());
        assert!(parse_lat_lon("-90", "-180").is_ok());
        assert!(parse_lat_lon("0", "0").is_ok());
    }

    #[test]
    fn out_of_range_is_rejected() {
        assert!(parse_lat_lon("90.0001", "0").is_err());
        assert!(parse_lat_lon("-91", "0").is_err());
        assert!(parse_lat_lon("0", "180.5").is_err());
        assert!(parse_lat_lon("0", "-181").is_err());
    }

    #[test]
    fn non_numeric_and_non_finite_are_rejected() {
        assert!(parse_lat_lon("north", "11").is_err());
        assert!(parse_lat_lon("48", "").is_err());
        // f64::from_str happily parses these, so the finiteness check has to catch them
        assert!(parse_lat_lon("NaN", "11").is_err());
        assert!(parse_lat_lon("48", "inf").is_err());
    }

    #[test]
    fn rejection_message_echoes_the_raw_tokens() {
        let err = parse_lat_lon("95", "11").unwrap_err();
        assert!(err.to_string().contains("lat 95"));
        assert!(err.to_string().contains("lon 11"));
    }
}
