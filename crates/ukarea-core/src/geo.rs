//! Geographic value types shared by the lookup pipeline and the front ends.
//!
//! Coordinates are plain WGS84 degrees. Boxes are axis-aligned in lat/lng
//! space and are never normalized: an inverted box is a valid value that
//! simply contains nothing.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Tolerance for "point lies on a polygon edge" checks, in degrees.
const EDGE_EPSILON: f64 = 1e-12;

/// The region the map is clamped to.
pub const UK_BOUNDS: BoundingBox = BoundingBox {
    south: 49.8,
    west: -8.6,
    north: 60.9,
    east: 1.8,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a point after checking both axes are in range.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidLatitude`] or [`CoreError::InvalidLongitude`]
    /// when a value is out of range or not finite.
    pub fn try_new(latitude: f64, longitude: f64) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::InvalidLongitude(longitude));
        }
        Ok(Self::new(latitude, longitude))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    #[must_use]
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Smallest box covering every point, or `None` for an empty input.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GeoPoint>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let init = Self::new(
            first.latitude,
            first.longitude,
            first.latitude,
            first.longitude,
        );
        Some(iter.fold(init, |acc, p| Self {
            south: acc.south.min(p.latitude),
            west: acc.west.min(p.longitude),
            north: acc.north.max(p.latitude),
            east: acc.east.max(p.longitude),
        }))
    }

    /// True when `south > north` or `west > east`.
    #[must_use]
    pub fn is_inverted(&self) -> bool {
        self.south > self.north || self.west > self.east
    }

    /// Inclusive containment: points on an edge count as inside.
    #[must_use]
    pub fn contains(&self, point: GeoPoint) -> bool {
        point.latitude >= self.south
            && point.latitude <= self.north
            && point.longitude >= self.west
            && point.longitude <= self.east
    }

    /// Overlap of two boxes. Disjoint boxes produce an inverted box.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            south: self.south.max(other.south),
            west: self.west.max(other.west),
            north: self.north.min(other.north),
            east: self.east.min(other.east),
        }
    }
}

/// How a point is tested against a drawn shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainmentMode {
    /// Axis-aligned bounds of the shape, whatever its outline.
    #[default]
    Bounds,
    /// Rectangles by bounds, polygons by their actual outline.
    Exact,
}

impl std::fmt::Display for ContainmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainmentMode::Bounds => write!(f, "bounds"),
            ContainmentMode::Exact => write!(f, "exact"),
        }
    }
}

impl std::str::FromStr for ContainmentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bounds" => Ok(Self::Bounds),
            "exact" => Ok(Self::Exact),
            other => Err(format!("expected 'bounds' or 'exact', got '{other}'")),
        }
    }
}

/// A user-drawn shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Rectangle(BoundingBox),
    Polygon { vertices: Vec<GeoPoint> },
}

impl Shape {
    /// Builds a polygon, rejecting outlines with fewer than three vertices.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::TooFewVertices`] for degenerate outlines.
    pub fn polygon(vertices: Vec<GeoPoint>) -> Result<Self, CoreError> {
        if vertices.len() < 3 {
            return Err(CoreError::TooFewVertices(vertices.len()));
        }
        Ok(Self::Polygon { vertices })
    }

    /// Axis-aligned bounds; `None` for a polygon with no vertices.
    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Shape::Rectangle(bbox) => Some(*bbox),
            Shape::Polygon { vertices } => BoundingBox::from_points(vertices),
        }
    }

    /// Checks shapes that arrive already built, e.g. deserialized from a
    /// request body: every coordinate in range, polygons with at least three
    /// vertices. Inverted rectangles pass; they simply cover nothing.
    ///
    /// # Errors
    ///
    /// Returns the first [`CoreError`] found.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Shape::Rectangle(bbox) => {
                GeoPoint::try_new(bbox.south, bbox.west)?;
                GeoPoint::try_new(bbox.north, bbox.east)?;
            }
            Shape::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Err(CoreError::TooFewVertices(vertices.len()));
                }
                for vertex in vertices {
                    GeoPoint::try_new(vertex.latitude, vertex.longitude)?;
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, point: GeoPoint, mode: ContainmentMode) -> bool {
        match (self, mode) {
            (Shape::Rectangle(bbox), _) => bbox.contains(point),
            (Shape::Polygon { .. }, ContainmentMode::Bounds) => {
                self.bounds().is_some_and(|b| b.contains(point))
            }
            (Shape::Polygon { vertices }, ContainmentMode::Exact) => {
                polygon_contains(vertices, point)
            }
        }
    }
}

/// Even-odd ray casting along the longitude axis. Edge points count as inside.
fn polygon_contains(vertices: &[GeoPoint], point: GeoPoint) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[j];
        if on_segment(a, b, point) {
            return true;
        }
        if (a.latitude > point.latitude) != (b.latitude > point.latitude) {
            let crossing = (b.longitude - a.longitude) * (point.latitude - a.latitude)
                / (b.latitude - a.latitude)
                + a.longitude;
            if point.longitude < crossing {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(a: GeoPoint, b: GeoPoint, p: GeoPoint) -> bool {
    let cross = (b.longitude - a.longitude) * (p.latitude - a.latitude)
        - (b.latitude - a.latitude) * (p.longitude - a.longitude);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.longitude >= a.longitude.min(b.longitude) - EDGE_EPSILON
        && p.longitude <= a.longitude.max(b.longitude) + EDGE_EPSILON
        && p.latitude >= a.latitude.min(b.latitude) - EDGE_EPSILON
        && p.latitude <= a.latitude.max(b.latitude) + EDGE_EPSILON
}
