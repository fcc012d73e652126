//! `cities` and `resolve` command handlers.
//!
//! Both start by resolving the configured city list by name. Cities whose
//! lookup fails are logged and left unresolved, so they never match a shape.

use std::path::Path;

use anyhow::Context;
use ukarea_core::{export, load_cities, AppConfig, ContainmentMode, ExportFormat, Shape};
use ukarea_lookup::{
    filter_cities, resolve_cities, PostcodesClient, ResolveOutcome, ResolveReport,
    NO_CITIES_MESSAGE,
};

use crate::output::write_export;

async fn load_resolved_cities(config: &AppConfig) -> anyhow::Result<ResolveReport> {
    let file = load_cities(&config.cities_path).with_context(|| {
        format!(
            "failed to load city list from {}",
            config.cities_path.display()
        )
    })?;
    let client = PostcodesClient::from_config(config).context("failed to build postcodes client")?;
    Ok(resolve_cities(&client, file.into_records(), config.max_concurrent_lookups).await)
}

/// Lists cities inside the union of `shapes`, largest first.
///
/// # Errors
///
/// Returns an error if the city list cannot be loaded, the client cannot be
/// built, or the output cannot be written.
pub(crate) async fn run_cities(
    config: &AppConfig,
    shapes: &[Shape],
    min_population: u64,
    exact: bool,
    format: ExportFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let report = load_resolved_cities(config).await?;
    if report.failed_count() > 0 {
        eprintln!(
            "warning: {} cities could not be resolved and were skipped",
            report.failed_count()
        );
    }

    let mode = if exact {
        ContainmentMode::Exact
    } else {
        config.containment_mode
    };
    let matched = filter_cities(&report.cities, shapes, min_population, mode);
    if matched.is_empty() {
        eprintln!("{NO_CITIES_MESSAGE}");
        return Ok(());
    }

    eprintln!("{} cities found", matched.len());
    let body = export::render_cities(format, &matched);
    write_export(output, "cities", format, &body)
}

/// Resolves every configured city and prints what happened to each.
///
/// # Errors
///
/// Returns an error if the city list cannot be loaded, the client cannot be
/// built, or a JSON line cannot be serialized.
pub(crate) async fn run_resolve(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let report = load_resolved_cities(config).await?;

    for (city, outcome) in report.cities.iter().zip(&report.outcomes) {
        if json {
            let line = serde_json::json!({
                "city": city.name,
                "population": city.population,
                "area_code": city.area_code,
                "result": outcome,
            });
            println!("{}", serde_json::to_string(&line)?);
            continue;
        }
        let status = match outcome {
            ResolveOutcome::Resolved(point) => {
                format!("{:.4},{:.4}", point.latitude, point.longitude)
            }
            ResolveOutcome::NoMatch => "no match".to_string(),
            ResolveOutcome::Failed(reason) => format!("failed: {reason}"),
        };
        println!("{:<24} {:>10}  {status}", city.name, city.population);
    }

    eprintln!(
        "resolved {} of {} cities ({} no match, {} failed)",
        report.resolved_count(),
        report.outcomes.len(),
        report.no_match_count(),
        report.failed_count()
    );
    Ok(())
}
