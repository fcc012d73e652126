use ukarea_core::{CityRecord, ContainmentMode, Shape};

/// Shown when no known city falls inside the drawn shapes.
pub const NO_CITIES_MESSAGE: &str = "No major cities found in these areas";

/// Cities with resolved coordinates, at least `min_population` people, and
/// inside any of `shapes` (a union across shapes, edges inclusive).
///
/// Sorted by population descending; ties keep their input order.
#[must_use]
pub fn filter_cities(
    cities: &[CityRecord],
    shapes: &[Shape],
    min_population: u64,
    mode: ContainmentMode,
) -> Vec<CityRecord> {
    let mut matched: Vec<CityRecord> = cities
        .iter()
        .filter(|city| city.population >= min_population)
        .filter(|city| {
            city.coordinates
                .is_some_and(|point| shapes.iter().any(|shape| shape.contains(point, mode)))
        })
        .cloned()
        .collect();

    // `sort_by` is stable, which keeps list order among equal populations.
    matched.sort_by(|a, b| b.population.cmp(&a.population));
    matched
}
