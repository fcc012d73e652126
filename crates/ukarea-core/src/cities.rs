use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, GeoPoint};

/// One entry of the city list as written in `cities.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    pub population: u64,
    pub area_code: String,
}

#[derive(Debug, Deserialize)]
pub struct CitiesFile {
    pub cities: Vec<CityConfig>,
}

impl CitiesFile {
    /// Turns the configured list into records awaiting coordinate resolution.
    #[must_use]
    pub fn into_records(self) -> Vec<CityRecord> {
        self.cities.into_iter().map(CityRecord::from).collect()
    }
}

/// A known city. `coordinates` stays `None` until a name lookup resolves it,
/// and an unresolved city never shows up in spatial results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub name: String,
    pub population: u64,
    pub area_code: String,
    pub coordinates: Option<GeoPoint>,
}

impl From<CityConfig> for CityRecord {
    fn from(config: CityConfig) -> Self {
        Self {
            name: config.name,
            population: config.population,
            area_code: config.area_code,
            coordinates: None,
        }
    }
}

/// Load and validate the city list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_cities(path: &Path) -> Result<CitiesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CitiesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_cities(&content)
}

/// Parse and validate a city list from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the text does not parse or fails validation.
pub fn parse_cities(content: &str) -> Result<CitiesFile, ConfigError> {
    let cities_file: CitiesFile =
        serde_yaml::from_str(content).map_err(ConfigError::CitiesFileParse)?;

    validate_cities(&cities_file)?;

    Ok(cities_file)
}

fn validate_cities(cities_file: &CitiesFile) -> Result<(), ConfigError> {
    let mut seen_names = HashSet::new();

    for city in &cities_file.cities {
        if city.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "city name must be non-empty".to_string(),
            ));
        }

        if city.area_code.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "city '{}' has an empty area code",
                city.name
            )));
        }

        if !seen_names.insert(city.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate city name: '{}'",
                city.name
            )));
        }
    }

    Ok(())
}
