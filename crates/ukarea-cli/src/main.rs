mod cities;
mod output;
mod postcodes;
mod shapes;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use ukarea_core::{BoundingBox, ExportFormat, Shape};

#[derive(Debug, Parser)]
#[command(name = "ukarea-cli")]
#[command(about = "Find UK postcodes and cities inside a drawn area")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the postcode districts covering one rectangle or polygon
    Postcodes {
        /// Rectangle as "south,west,north,east" in decimal degrees
        #[arg(
            long,
            value_parser = shapes::parse_bbox,
            allow_hyphen_values = true,
            conflicts_with = "polygon",
            required_unless_present = "polygon"
        )]
        bbox: Option<BoundingBox>,

        /// Polygon as "lat,lng;lat,lng;lat,lng..." (at least three vertices)
        #[arg(long, value_parser = shapes::parse_polygon, allow_hyphen_values = true)]
        polygon: Option<Shape>,

        /// Sample only inside a polygon's outline rather than its bounds
        #[arg(long)]
        exact: bool,

        /// Grid spacing in degrees (defaults to UKAREA_GRID_STEP_DEGREES)
        #[arg(long)]
        step: Option<f64>,

        /// Output format: csv or xls
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// File or directory to write to; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List known cities inside the union of one or more shapes
    Cities {
        /// Rectangle as "south,west,north,east"; repeatable
        #[arg(
            long,
            value_parser = shapes::parse_bbox,
            allow_hyphen_values = true,
            required_unless_present = "polygon"
        )]
        bbox: Vec<BoundingBox>,

        /// Polygon as "lat,lng;lat,lng;..."; repeatable
        #[arg(long, value_parser = shapes::parse_polygon, allow_hyphen_values = true)]
        polygon: Vec<Shape>,

        /// Only include cities with at least this many residents
        #[arg(long, default_value = "0")]
        min_population: u64,

        /// Test polygons by their outline rather than their bounds
        #[arg(long)]
        exact: bool,

        /// Output format: csv or xls
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// File or directory to write to; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Resolve coordinates for the configured city list and report outcomes
    Resolve {
        /// Print one JSON object per city instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = ukarea_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Postcodes {
            bbox,
            polygon,
            exact,
            step,
            format,
            output,
        } => {
            let shape = match (bbox, polygon) {
                (Some(bbox), _) => Shape::Rectangle(bbox),
                (None, Some(polygon)) => polygon,
                (None, None) => anyhow::bail!("either --bbox or --polygon is required"),
            };
            postcodes::run_postcodes(&config, &shape, exact, step, format, output.as_deref())
                .await?;
        }
        Commands::Cities {
            bbox,
            polygon,
            min_population,
            exact,
            format,
            output,
        } => {
            let shapes: Vec<Shape> = bbox
                .into_iter()
                .map(Shape::Rectangle)
                .chain(polygon)
                .collect();
            cities::run_cities(
                &config,
                &shapes,
                min_population,
                exact,
                format,
                output.as_deref(),
            )
            .await?;
        }
        Commands::Resolve { json } => cities::run_resolve(&config, json).await?,
    }

    Ok(())
}
