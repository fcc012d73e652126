//! Geographic grid sampling.
//!
//! Turns a bounding box into a regular lat/lng lattice that the bulk
//! reverse-geocoder is queried with. Spacing is uniform in degrees, so
//! columns are narrower on the ground further north; at UK latitudes the
//! default 0.01° step is roughly 1.1 km north-south and 0.6–0.7 km east-west.

use ukarea_core::{BoundingBox, GeoPoint};

/// Default lattice spacing in degrees.
pub const DEFAULT_STEP_DEGREES: f64 = 0.01;

/// Fraction of a step by which a lattice line may overshoot the upper bound
/// and still be kept, absorbing floating-point error in `(north - south) / step`.
const BOUND_TOLERANCE: f64 = 1e-9;

/// Lazily yields the lattice in row-major order: all longitudes of the
/// southernmost row first, then the next row north.
#[derive(Debug, Clone)]
pub struct GridIter {
    south: f64,
    west: f64,
    step: f64,
    cols: usize,
    total: usize,
    next: usize,
}

impl GridIter {
    /// Builds the iterator. Inverted boxes and non-positive or non-finite
    /// steps produce an empty lattice.
    #[must_use]
    pub fn new(bbox: &BoundingBox, step: f64) -> Self {
        let rows = line_count(bbox.south, bbox.north, step);
        let cols = line_count(bbox.west, bbox.east, step);
        Self {
            south: bbox.south,
            west: bbox.west,
            step,
            cols,
            total: rows.saturating_mul(cols),
            next: 0,
        }
    }
}

impl Iterator for GridIter {
    type Item = GeoPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let row = self.next / self.cols;
        let col = self.next % self.cols;
        self.next += 1;
        #[allow(clippy::cast_precision_loss)]
        let (row, col) = (row as f64, col as f64);
        Some(GeoPoint::new(
            self.south + row * self.step,
            self.west + col * self.step,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridIter {}

/// Samples `bbox` at `step` degrees, including the upper bound when it
/// lands on a lattice line within tolerance.
#[must_use]
pub fn sample(bbox: &BoundingBox, step: f64) -> Vec<GeoPoint> {
    GridIter::new(bbox, step).collect()
}

/// Number of lattice lines `low, low + step, ...` that do not pass `high`.
#[allow(clippy::cast_precision_loss)]
fn line_count(low: f64, high: f64, step: f64) -> usize {
    if !step.is_finite() || step <= 0.0 || !low.is_finite() || !high.is_finite() || high < low {
        return 0;
    }
    let spans = ((high - low) / step + BOUND_TOLERANCE).floor();
    if !spans.is_finite() || spans >= usize::MAX as f64 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let spans = spans as usize;
    spans + 1
}
