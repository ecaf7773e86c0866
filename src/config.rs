use serde::Deserialize;
use std::path::{Path, PathBuf};

use thiserror::Error;

// =============================================================================
// Download-related constants
// =============================================================================

/// Default number of attempts when downloading a reference table
pub const DEFAULT_DOWNLOAD_RETRIES: u32 = 3;

/// Per-attempt timeout for reference table downloads in milliseconds (10 seconds)
pub const DEFAULT_DOWNLOAD_TIMEOUT_MS: u64 = 10_000;

/// Delay between download attempts in milliseconds (2 seconds)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

/// Environment variable overriding the upload directory
pub const UPLOAD_DIR_ENV: &str = "DEP_RECONCILE_UPLOAD_DIR";

/// Environment variable overriding the output directory
pub const OUTPUT_DIR_ENV: &str = "DEP_RECONCILE_OUTPUT_DIR";

#[derive(Debug, Error)]
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

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Pipeline configuration structure
///
/// Every path the pipeline touches is enumerated here and passed to the
/// pipeline entry point; nothing is read from process-wide globals after
/// startup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Directory searched for `*.deps.json` manifests
    pub upload_dir: PathBuf,
    /// Directory the finished table is served from
    pub output_dir: PathBuf,
    /// Directory holding stage checkpoints and downloaded reference tables
    pub work_dir: PathBuf,
    /// Reference table location used when the second argument is a manifest
    pub reference_url: Option<String>,
    /// Persist the table after each stage
    pub checkpoint: bool,
    /// Log filter used when RUST_LOG is unset (e.g. "debug", "dep_reconcile=trace")
    pub log_filter: Option<String>,
    pub download: DownloadConfig,
    pub registries: RegistriesConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_dir: upload_dir(),
            output_dir: output_dir(),
            work_dir: work_dir(),
            reference_url: None,
            checkpoint: true,
            log_filter: None,
            download: DownloadConfig::default(),
            registries: RegistriesConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a JSON file, using defaults for missing fields
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks the configuration before a run starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download.retries == 0 {
            return Err(ConfigError::Invalid(
                "download.retries must be at least 1".to_string(),
            ));
        }
        if self.download.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "download.timeoutMs must be greater than 0".to_string(),
            ));
        }
        if self.output_dir == self.work_dir {
            return Err(ConfigError::Invalid(
                "outputDir and workDir must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reference table download settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloadConfig {
    /// Maximum number of attempts
    pub retries: u32,
    /// Per-attempt request timeout in milliseconds
    pub timeout_ms: u64,
    /// Fixed delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_DOWNLOAD_RETRIES,
            timeout_ms: DEFAULT_DOWNLOAD_TIMEOUT_MS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

/// Registry-specific configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RegistriesConfig {
    pub nuget: RegistryConfig,
    pub optimizely: RegistryConfig,
    pub github: RegistryConfig,
}

/// Individual registry configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    pub enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Returns the upload directory.
/// Uses $DEP_RECONCILE_UPLOAD_DIR if set, otherwise ~/upload.
pub fn upload_dir() -> PathBuf {
    dir_with_env(std::env::var(UPLOAD_DIR_ENV).ok(), dirs::home_dir(), "upload")
}

/// Returns the output directory.
/// Uses $DEP_RECONCILE_OUTPUT_DIR if set, otherwise ~/output.
pub fn output_dir() -> PathBuf {
    dir_with_env(std::env::var(OUTPUT_DIR_ENV).ok(), dirs::home_dir(), "output")
}

/// Returns the path to the data directory for dep-reconcile.
/// Uses $XDG_DATA_HOME/dep-reconcile if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/dep-reconcile,
/// or ./dep-reconcile if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the directory holding stage checkpoints.
pub fn work_dir() -> PathBuf {
    data_dir().join("work")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("dep-reconcile.log")
}

fn dir_with_env(overridden: Option<String>, home_dir: Option<PathBuf>, name: &str) -> PathBuf {
    overridden
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(name)))
        .unwrap_or_else(|| PathBuf::from(".").join(name))
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("dep-reconcile")
}
