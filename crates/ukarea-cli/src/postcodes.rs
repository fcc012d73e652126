//! `postcodes` command handler.

use std::path::Path;

use anyhow::Context;
use ukarea_core::{export, AppConfig, ContainmentMode, ExportFormat, Shape};
use ukarea_lookup::{
    search_postcodes, PostcodesClient, SearchOptions, FETCH_FAILED_MESSAGE, NO_POSTCODES_MESSAGE,
};

use crate::output::write_export;

/// Runs one postcode search and writes the outward codes.
///
/// A failed batch aborts the whole search; nothing is written and the
/// generic retry message is returned as the error.
///
/// # Errors
///
/// Returns an error for an invalid `--step`, if the client cannot be built,
/// if the search fails upstream, or if the output cannot be written.
pub(crate) async fn run_postcodes(
    config: &AppConfig,
    shape: &Shape,
    exact: bool,
    step: Option<f64>,
    format: ExportFormat,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let options = search_options(config, exact, step)?;
    let client = PostcodesClient::from_config(config).context("failed to build postcodes client")?;

    let search = match search_postcodes(&client, shape, &options, None).await {
        Ok(search) => search,
        Err(e) => {
            tracing::error!(error = %e, "postcode search failed");
            return Err(anyhow::Error::new(e).context(FETCH_FAILED_MESSAGE));
        }
    };

    if search.is_empty() {
        eprintln!("{NO_POSTCODES_MESSAGE}");
        return Ok(());
    }

    eprintln!(
        "{} postcode districts ({} distinct postcodes from {} points in {} requests)",
        search.outward_codes.len(),
        search.codes.len(),
        search.points_sampled,
        search.batches
    );
    let body = export::render_postcodes(format, &search.outward_codes);
    write_export(output, "postcodes", format, &body)
}

fn search_options(
    config: &AppConfig,
    exact: bool,
    step: Option<f64>,
) -> anyhow::Result<SearchOptions> {
    let mut options = SearchOptions::from_config(config);
    if exact {
        options.containment_mode = ContainmentMode::Exact;
    }
    if let Some(step) = step {
        if !step.is_finite() || step <= 0.0 {
            anyhow::bail!("--step must be a positive number of degrees, got {step}");
        }
        options.step_degrees = step;
    }
    Ok(options)
}
