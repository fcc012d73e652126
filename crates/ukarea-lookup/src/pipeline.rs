//! Shape → postcode search pipeline.
//!
//! Samples the shape's bounds on a lattice, pulls the points in API-sized
//! batches, and reverse-geocodes the batches strictly one after another.
//! Any batch failure fails the whole search and the partial result is
//! dropped with the aggregator.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Serialize;
use ukarea_core::{
    AppConfig, BoundingBox, ContainmentMode, GeoPoint, PostalCode, Shape, UK_BOUNDS,
};

use crate::aggregate::{normalize, ResultAggregator};
use crate::batch::{batches, DEFAULT_BATCH_SIZE};
use crate::error::LookupError;
use crate::grid::{GridIter, DEFAULT_STEP_DEGREES};
use crate::lookup::GeoLookup;
use crate::session::QueryTicket;

/// Default search radius around each lattice point, in metres.
pub const DEFAULT_RADIUS_M: u32 = 1000;

/// Shown to the user whenever a search fails upstream.
pub const FETCH_FAILED_MESSAGE: &str = "Error fetching postcodes. Please try again.";

/// Shown when a search completes without a single postcode.
pub const NO_POSTCODES_MESSAGE: &str = "No postcodes found in this area";

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub step_degrees: f64,
    pub batch_size: NonZeroUsize,
    pub radius_m: u32,
    /// Postcodes requested per point; only the closest one is kept.
    pub limit_per_point: u32,
    /// Pause between consecutive batch requests.
    pub inter_request_delay_ms: u64,
    /// `Exact` drops lattice points outside a polygon's outline.
    pub containment_mode: ContainmentMode,
    /// Bounds are intersected with this box before sampling.
    pub clamp_to: Option<BoundingBox>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            step_degrees: DEFAULT_STEP_DEGREES,
            batch_size: DEFAULT_BATCH_SIZE,
            radius_m: DEFAULT_RADIUS_M,
            limit_per_point: 1,
            inter_request_delay_ms: 0,
            containment_mode: ContainmentMode::Bounds,
            clamp_to: Some(UK_BOUNDS),
        }
    }
}

impl SearchOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            step_degrees: config.grid_step_degrees,
            batch_size: config.batch_size,
            radius_m: config.lookup_radius_m,
            limit_per_point: config.lookup_limit,
            inter_request_delay_ms: config.inter_request_delay_ms,
            containment_mode: config.containment_mode,
            clamp_to: config.clamp_to_uk.then_some(UK_BOUNDS),
        }
    }
}

/// Outcome of one postcode search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostcodeSearch {
    /// Distinct full postcodes.
    pub codes: BTreeSet<PostalCode>,
    /// Distinct outward codes, sorted; this is what gets exported.
    pub outward_codes: Vec<String>,
    pub points_sampled: usize,
    pub batches: usize,
}

impl PostcodeSearch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Lattice points that will be queried for `shape` under `options`.
///
/// The lattice is produced lazily; nothing is collected, so a huge box only
/// costs time.
pub fn sample_shape<'a>(
    shape: &'a Shape,
    options: &SearchOptions,
) -> impl Iterator<Item = GeoPoint> + Send + 'a {
    let grid = shape.bounds().map(|bounds| {
        let bounds = options
            .clamp_to
            .map_or(bounds, |region| bounds.intersection(&region));
        GridIter::new(&bounds, options.step_degrees)
    });
    let clip = matches!(shape, Shape::Polygon { .. })
        && matches!(options.containment_mode, ContainmentMode::Exact);

    grid.into_iter()
        .flatten()
        .filter(move |p| !clip || shape.contains(*p, ContainmentMode::Exact))
}

/// Runs the full search for one shape.
///
/// Batches are pulled from the lattice and awaited one at a time, in lattice
/// order. When a `ticket` is given it is checked before every batch, and a
/// superseded search stops with [`LookupError::Superseded`] without sending
/// further requests.
///
/// # Errors
///
/// Returns the first batch error (the partial result is discarded) or
/// [`LookupError::Superseded`].
pub async fn search_postcodes<L: GeoLookup>(
    lookup: &L,
    shape: &Shape,
    options: &SearchOptions,
    ticket: Option<&QueryTicket>,
) -> Result<PostcodeSearch, LookupError> {
    tracing::info!(
        step = options.step_degrees,
        batch_size = options.batch_size.get(),
        "starting postcode search"
    );

    let mut aggregator = ResultAggregator::new();
    let mut points_sampled = 0usize;
    let mut batch_count = 0usize;

    for batch in batches(sample_shape(shape, options), options.batch_size) {
        let index = batch_count;
        if ticket.is_some_and(|t| !t.is_current()) {
            tracing::info!(batch = index, "postcode search superseded, stopping");
            return Err(LookupError::Superseded);
        }

        if index > 0 && options.inter_request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.inter_request_delay_ms)).await;
        }

        let slots = lookup
            .lookup_batch(&batch, options.radius_m, options.limit_per_point)
            .await
            .inspect_err(|e| {
                tracing::warn!(
                    batch = index,
                    error = %e,
                    "batch lookup failed, abandoning search"
                );
            })?;
        points_sampled += batch.len();
        batch_count += 1;
        aggregator.absorb(slots);
        tracing::debug!(
            batch = index,
            points = points_sampled,
            distinct = aggregator.distinct_codes(),
            "batch complete"
        );
    }

    tracing::info!(
        points = points_sampled,
        batches = batch_count,
        matched = aggregator.matched_slots(),
        empty = aggregator.empty_slots(),
        distinct = aggregator.distinct_codes(),
        "postcode search complete"
    );

    let codes = aggregator.into_codes();
    let outward_codes = normalize(&codes);
    Ok(PostcodeSearch {
        codes,
        outward_codes,
        points_sampled,
        batches: batch_count,
    })
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
