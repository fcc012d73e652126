use std::num::NonZeroUsize;

use crate::app_config::{AppConfig, Environment};
use crate::{ConfigError, ContainmentMode};

/// Hard cap on geolocations per bulk request imposed by postcodes.io.
pub const MAX_BATCH_SIZE: usize = 100;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_non_zero = |var: &str, default: &str| -> Result<NonZeroUsize, ConfigError> {
        or_default(var, default)
            .parse::<NonZeroUsize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let env = parse_environment(&or_default("UKAREA_ENV", "development"));
    let bind_addr = parse_addr("UKAREA_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("UKAREA_LOG_LEVEL", "info");
    let cities_path = PathBuf::from(or_default("UKAREA_CITIES_PATH", "./config/cities.yaml"));
    let postcodes_api_url = or_default("UKAREA_POSTCODES_API_URL", "https://api.postcodes.io/");

    let request_timeout_secs = parse_u64("UKAREA_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("UKAREA_USER_AGENT", "ukarea/0.1 (area-search)");

    let grid_step_degrees = or_default("UKAREA_GRID_STEP_DEGREES", "0.01")
        .parse::<f64>()
        .map_err(|e| invalid("UKAREA_GRID_STEP_DEGREES", e.to_string()))?;
    if !grid_step_degrees.is_finite() || grid_step_degrees <= 0.0 {
        return Err(invalid(
            "UKAREA_GRID_STEP_DEGREES",
            format!("must be a positive number of degrees, got {grid_step_degrees}"),
        ));
    }

    let batch_size = parse_non_zero("UKAREA_BATCH_SIZE", "100")?;
    if batch_size.get() > MAX_BATCH_SIZE {
        return Err(invalid(
            "UKAREA_BATCH_SIZE",
            format!("must be at most {MAX_BATCH_SIZE}, got {batch_size}"),
        ));
    }

    let lookup_radius_m = parse_u32("UKAREA_LOOKUP_RADIUS_M", "1000")?;
    let lookup_limit = parse_u32("UKAREA_LOOKUP_LIMIT", "1")?;
    if lookup_limit == 0 {
        return Err(invalid("UKAREA_LOOKUP_LIMIT", "must be at least 1".to_string()));
    }

    let max_concurrent_lookups = parse_non_zero("UKAREA_MAX_CONCURRENT_LOOKUPS", "8")?;
    let inter_request_delay_ms = parse_u64("UKAREA_INTER_REQUEST_DELAY_MS", "0")?;
    let max_retries = parse_u32("UKAREA_MAX_RETRIES", "0")?;
    let retry_backoff_base_ms = parse_u64("UKAREA_RETRY_BACKOFF_BASE_MS", "1000")?;

    let containment_mode = or_default("UKAREA_CONTAINMENT_MODE", "bounds")
        .parse::<ContainmentMode>()
        .map_err(|reason| invalid("UKAREA_CONTAINMENT_MODE", reason))?;
    let clamp_to_uk = parse_bool("UKAREA_CLAMP_TO_UK", "true")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        cities_path,
        postcodes_api_url,
        request_timeout_secs,
        user_agent,
        grid_step_degrees,
        batch_size,
        lookup_radius_m,
        lookup_limit,
        max_concurrent_lookups,
        inter_request_delay_ms,
        max_retries,
        retry_backoff_base_ms,
        containment_mode,
        clamp_to_uk,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
