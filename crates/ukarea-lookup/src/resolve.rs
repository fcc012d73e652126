//! Startup resolution of city coordinates by name.

use std::num::NonZeroUsize;

use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use ukarea_core::{CityRecord, GeoPoint};

use crate::lookup::GeoLookup;

/// What happened to one city's lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ResolveOutcome {
    Resolved(GeoPoint),
    /// The service answered but had no match for the name.
    NoMatch,
    /// The request failed; holds the error text.
    Failed(String),
}

/// Cities in list order, with coordinates filled in where resolution
/// succeeded, plus a parallel list of per-city outcomes.
#[derive(Debug, Clone)]
pub struct ResolveReport {
    pub cities: Vec<CityRecord>,
    pub outcomes: Vec<ResolveOutcome>,
}

impl ResolveReport {
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.count(|o| matches!(o, ResolveOutcome::Resolved(_)))
    }

    #[must_use]
    pub fn no_match_count(&self) -> usize {
        self.count(|o| matches!(o, ResolveOutcome::NoMatch))
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, ResolveOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ResolveOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Looks up every city's coordinates with at most `max_concurrent` requests
/// in flight, yielding `(index, outcome)` as each lookup settles.
///
/// Outcomes arrive in completion order, not list order; `index` points back
/// into `cities`. Each lookup is independent: a failure or a miss leaves that
/// city unresolved and never affects the others. Cities that already carry
/// coordinates are not looked up again.
pub fn resolve_stream<'a, L: GeoLookup>(
    lookup: &'a L,
    cities: Vec<CityRecord>,
    max_concurrent: NonZeroUsize,
) -> impl Stream<Item = (usize, ResolveOutcome)> + Send + 'a {
    stream::iter(cities.into_iter().enumerate())
        .map(move |(index, city)| async move { (index, resolve_one(lookup, city).await) })
        .buffer_unordered(max_concurrent.get())
}

/// Resolves every city and waits for all of them.
///
/// Returns the cities in list order with coordinates filled in where
/// resolution succeeded.
pub async fn resolve_cities<L: GeoLookup>(
    lookup: &L,
    cities: Vec<CityRecord>,
    max_concurrent: NonZeroUsize,
) -> ResolveReport {
    tracing::info!(
        cities = cities.len(),
        max_concurrent = max_concurrent.get(),
        "resolving city coordinates"
    );

    let mut settled: Vec<(usize, ResolveOutcome)> =
        resolve_stream(lookup, cities.clone(), max_concurrent)
            .collect()
            .await;
    settled.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<ResolveOutcome> = settled.into_iter().map(|(_, outcome)| outcome).collect();

    let cities = cities
        .into_iter()
        .zip(&outcomes)
        .map(|(mut city, outcome)| {
            if let ResolveOutcome::Resolved(point) = outcome {
                city.coordinates = Some(*point);
            }
            city
        })
        .collect();

    let report = ResolveReport { cities, outcomes };
    tracing::info!(
        resolved = report.resolved_count(),
        no_match = report.no_match_count(),
        failed = report.failed_count(),
        "city resolution finished"
    );
    report
}

async fn resolve_one<L: GeoLookup>(lookup: &L, city: CityRecord) -> ResolveOutcome {
    if let Some(point) = city.coordinates {
        return ResolveOutcome::Resolved(point);
    }
    match lookup.lookup_by_name(&city.name).await {
        Ok(Some(point)) => ResolveOutcome::Resolved(point),
        Ok(None) => {
            tracing::warn!(city = %city.name, "no coordinates found for city");
            ResolveOutcome::NoMatch
        }
        Err(e) => {
            tracing::warn!(city = %city.name, error = %e, "city lookup failed");
            ResolveOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use ukarea_core::PostalCode;

    use super::*;
    use crate::error::LookupError;

    /// Fails "Broken", misses "Nowhere", answers "Slow" late, resolves
    /// anything else to one fixed point. Records peak concurrency.
    #[derive(Default)]
    struct NameLookup {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl GeoLookup for NameLookup {
        async fn lookup_batch(
            &self,
            _points: &[GeoPoint],
            _radius_m: u32,
            _limit_per_point: u32,
        ) -> Result<Vec<Option<PostalCode>>, LookupError> {
            Ok(Vec::new())
        }

        async fn lookup_by_name(&self, name: &str) -> Result<Option<GeoPoint>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = if name == "Slow" { 100 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match name {
                "Broken" => Err(LookupError::UnexpectedStatus {
                    status: 500,
                    url: "stub".to_string(),
                }),
                "Nowhere" => Ok(None),
                _ => Ok(Some(GeoPoint::new(52.0, -1.0))),
            }
        }
    }

    fn city(name: &str) -> CityRecord {
        CityRecord {
            name: name.to_string(),
            population: 1,
            area_code: "0".to_string(),
            coordinates: None,
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_others() {
        let lookup = NameLookup::default();
        let cities = vec![city("Leeds"), city("Broken"), city("Nowhere"), city("York")];
        let report = resolve_cities(&lookup, cities, NonZeroUsize::new(4).unwrap()).await;

        assert_eq!(report.resolved_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.no_match_count(), 1);

        let names: Vec<&str> = report.cities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Leeds", "Broken", "Nowhere", "York"]);
        assert!(report.cities[0].coordinates.is_some());
        assert!(report.cities[1].coordinates.is_none());
        assert!(report.cities[2].coordinates.is_none());
        assert!(report.cities[3].coordinates.is_some());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let lookup = NameLookup::default();
        let cities = (0..12).map(|i| city(&format!("Town{i}"))).collect();
        let report = resolve_cities(&lookup, cities, NonZeroUsize::new(3).unwrap()).await;

        assert_eq!(report.resolved_count(), 12);
        assert!(lookup.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn stream_yields_outcomes_as_they_settle() {
        let lookup = NameLookup::default();
        let cities = vec![city("Slow"), city("Leeds")];
        let settled: Vec<(usize, ResolveOutcome)> =
            resolve_stream(&lookup, cities, NonZeroUsize::new(2).unwrap())
                .collect()
                .await;

        let order: Vec<usize> = settled.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![1, 0]);
    }

    #[tokio::test]
    async fn resolve_stream_can_run_on_a_spawned_task() {
        let lookup = std::sync::Arc::new(NameLookup::default());
        let shared = std::sync::Arc::clone(&lookup);
        let resolved = tokio::spawn(async move {
            resolve_stream(shared.as_ref(), vec![city("Leeds")], NonZeroUsize::new(1).unwrap())
                .collect::<Vec<_>>()
                .await
        })
        .await
        .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_resolved_cities_are_skipped() {
        let lookup = NameLookup::default();
        let mut known = city("Known");
        known.coordinates = Some(GeoPoint::new(1.0, 1.0));
        let report = resolve_cities(&lookup, vec![known], NonZeroUsize::new(1).unwrap()).await;

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
        assert_eq!(report.cities[0].coordinates, Some(GeoPoint::new(1.0, 1.0)));
    }
}
