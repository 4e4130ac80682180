//! Service configuration.
//!
//! The binary fills this from command-line flags and environment variables;
//! tests usually start from `ServiceConfig::default()`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Number of recommendations returned when a request does not ask for a count
pub const DEFAULT_TOP_K: usize = 5;
/// Upper bound on `TopK` accepted from clients
pub const MAX_TOP_K: usize = 50;
/// Rating scale used by the place dataset
pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;

/// Bounds applied when validating a request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryLimits {
    pub default_top_k: usize,
    pub max_top_k: usize,
    pub min_rating: f64,
    pub max_rating: f64,
}

impl QueryLimits {
    /// Check the limits are self-consistent
    pub fn check(&self) -> Result<(), String> {
        if !(self.min_rating.is_finite() && self.max_rating.is_finite()) {
            return Err("rating bounds must be finite".to_string());
        }
        if self.min_rating > self.max_rating {
            return Err(format!(
                "min rating {} is greater than max rating {}",
                self.min_rating, self.max_rating
            ));
        }
        if self.max_top_k == 0 {
            return Err("max top-k must be at least 1".to_string());
        }
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(format!(
                "default top-k {} must be between 1 and {}",
                self.default_top_k, self.max_top_k
            ));
        }
        Ok(())
    }
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_top_k: DEFAULT_TOP_K,
            max_top_k: MAX_TOP_K,
            min_rating: MIN_RATING,
            max_rating: MAX_RATING,
        }
    }
}

/// Everything needed to start the service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// CSV file with one row per recommendable place
    pub catalog_path: PathBuf,
    /// Column holding the item identifier
    pub id_column: String,
    /// Address of the ranking model sidecar
    pub model_addr: String,
    /// Deadline for a single model call
    pub model_timeout: Duration,
    pub model_connect_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub limits: QueryLimits,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/tourism_with_id.csv"),
            id_column: "Place_Id".to_string(),
            model_addr: "http://localhost:50051".to_string(),
            model_timeout: Duration::from_millis(2000),
            model_connect_timeout: Duration::from_secs(5),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            limits: QueryLimits::default(),
        }
    }
}
