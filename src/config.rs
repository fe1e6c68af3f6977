/*!
 * Configuration
 * Environment-driven settings with defaults
 */

use std::path::PathBuf;
use std::time::Duration;

/// Default interval between background index sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Runtime configuration
///
/// Environment variables:
/// - HARBOR_DB_PATH: SQLite database location (default: data/harbor.db)
/// - HARBOR_ROOT_PATH: fallback root for provisioned home directories
///   (default: uploads)
/// - HARBOR_INDEX_INTERVAL_SECS: seconds between index sweeps
///   (default: 1800)
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub default_root: PathBuf,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let db_path = std::env::var("HARBOR_DB_PATH")
            .unwrap_or_else(|_| "data/harbor.db".to_string())
            .into();
        let default_root = std::env::var("HARBOR_ROOT_PATH")
            .unwrap_or_else(|_| "uploads".to_string())
            .into();
        let sweep_interval = std::env::var("HARBOR_INDEX_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);

        Self {
            db_path,
            default_root,
            sweep_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "data/harbor.db".into(),
            default_root: "uploads".into(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
