mod app_config;
mod cities;
mod config;
pub mod export;
mod geo;
mod postcode;

pub use app_config::{AppConfig, Environment};
pub use cities::{load_cities, parse_cities, CitiesFile, CityConfig, CityRecord};
pub use config::{load_app_config, load_app_config_from_env, MAX_BATCH_SIZE};
pub use export::ExportFormat;
pub use geo::{BoundingBox, ContainmentMode, GeoPoint, Shape, UK_BOUNDS};
pub use postcode::PostalCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("latitude {0} is outside -90..=90")]
    InvalidLatitude(f64),

    #[error("longitude {0} is outside -180..=180")]
    InvalidLongitude(f64),

    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    #[error("empty postal code")]
    EmptyPostalCode,

    #[error("unknown export format: {0}")]
    UnknownExportFormat(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read cities file {path}: {source}")]
    CitiesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse cities file: {0}")]
    CitiesFileParse(#[source] serde_yaml::Error),

    #[error("cities validation failed: {0}")]
    Validation(String),
}
