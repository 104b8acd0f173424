use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Time-related constants
// =============================================================================

/// Minimum spacing between the start of two registry calls (500ms)
pub const RATE_LIMIT_DELAY_MS: u64 = 500;

/// Timeout for a single registry request in milliseconds (10 seconds)
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Base delay for exponential retry backoff in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Number of retries after the first failed attempt
pub const MAX_RETRIES: u32 = 3;

/// Width of the time bucket used to key archive metadata cache entries
pub const METADATA_CACHE_BUCKET_SECS: i64 = 60;

/// Default base URL for the package registry API
pub const DEFAULT_REGISTRY_URL: &str = "https://api.modrinth.com/v2";

/// Engine configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub registry: RegistryConfig,
}

/// Registry client configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RegistryConfig {
    pub base_url: String,
    /// Minimum delay between outbound calls in milliseconds
    pub rate_limit_ms: u64,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    /// Optional lifetime of cached query results; `None` keeps entries until invalidated
    pub cache_ttl_ms: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            rate_limit_ms: RATE_LIMIT_DELAY_MS,
            timeout_ms: REQUEST_TIMEOUT_MS,
            max_retries: MAX_RETRIES,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
            cache_ttl_ms: None,
        }
    }
}

impl RegistryConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_ms.map(Duration::from_millis)
    }
}

/// Error raised while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    /// A missing file yields the default configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the path to the data directory for modsync.
/// Uses $XDG_DATA_HOME/modsync if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/modsync,
/// or ./modsync if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the default configuration file.
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("modsync.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("modsync")
}
