//! Parsers for shape arguments given on the command line.
//!
//! Coordinates are range-checked here so malformed input is rejected before
//! any request is made. Inverted rectangles are accepted; they simply cover
//! nothing.

use ukarea_core::{BoundingBox, GeoPoint, Shape};

/// Parses `"south,west,north,east"`.
pub(crate) fn parse_bbox(raw: &str) -> Result<BoundingBox, String> {
    let values = raw
        .split(',')
        .map(parse_coordinate)
        .collect::<Result<Vec<f64>, String>>()?;
    let [south, west, north, east] = values[..] else {
        return Err(format!(
            "expected 4 comma-separated values (south,west,north,east), got {}",
            values.len()
        ));
    };
    GeoPoint::try_new(south, west).map_err(|e| e.to_string())?;
    GeoPoint::try_new(north, east).map_err(|e| e.to_string())?;
    Ok(BoundingBox::new(south, west, north, east))
}

/// Parses `"lat,lng;lat,lng;..."` into a polygon of at least three vertices.
pub(crate) fn parse_polygon(raw: &str) -> Result<Shape, String> {
    let vertices = raw
        .split(';')
        .map(str::trim)
        .filter(|vertex| !vertex.is_empty())
        .map(parse_vertex)
        .collect::<Result<Vec<GeoPoint>, String>>()?;
    Shape::polygon(vertices).map_err(|e| e.to_string())
}

fn parse_vertex(raw: &str) -> Result<GeoPoint, String> {
    let Some((lat, lng)) = raw.split_once(',') else {
        return Err(format!("vertex '{raw}' must be 'lat,lng'"));
    };
    GeoPoint::try_new(parse_coordinate(lat)?, parse_coordinate(lng)?).map_err(|e| e.to_string())
}

fn parse_coordinate(raw: &str) -> Result<f64, String> {
    let trimmed = raw.trim();
    trimmed
        .parse::<f64>()
        .map_err(|_| format!("'{trimmed}' is not a number"))
}
