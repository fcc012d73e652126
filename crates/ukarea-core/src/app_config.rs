use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use crate::ContainmentMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub cities_path: PathBuf,
    pub postcodes_api_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Lattice spacing in degrees for postcode sampling.
    pub grid_step_degrees: f64,
    /// Points per bulk reverse-geocode request; never above the API cap of 100.
    pub batch_size: NonZeroUsize,
    pub lookup_radius_m: u32,
    pub lookup_limit: u32,
    /// Upper bound on in-flight city name lookups.
    pub max_concurrent_lookups: NonZeroUsize,
    pub inter_request_delay_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub containment_mode: ContainmentMode,
    pub clamp_to_uk: bool,
}
