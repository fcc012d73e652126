use std::future::Future;

use ukarea_core::{GeoPoint, PostalCode};

use crate::error::LookupError;

/// The two geocoding operations the search pipeline depends on.
///
/// [`crate::PostcodesClient`] is the production implementation; tests plug
/// in stubs to script responses and failures.
pub trait GeoLookup: Send + Sync {
    /// Reverse-geocodes one batch of points in a single round-trip.
    ///
    /// The result has one slot per input point, in input order; a slot is
    /// `None` when no postcode lies within `radius_m` of the point.
    fn lookup_batch(
        &self,
        points: &[GeoPoint],
        radius_m: u32,
        limit_per_point: u32,
    ) -> impl Future<Output = Result<Vec<Option<PostalCode>>, LookupError>> + Send;

    /// Forward lookup of a place name to the coordinates of its best match.
    fn lookup_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<GeoPoint>, LookupError>> + Send;
}
