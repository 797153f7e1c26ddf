use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::TailError;
use crate::registry::{self, FormatSpec, FormatTable};
use crate::scanner::{DEFAULT_CHUNK_SIZE, DEFAULT_MEM_CEILING, ScanOptions, StopPolicy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub formats: Vec<FormatEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: NonZeroUsize,
    #[serde(default = "default_mem_ceiling")]
    pub mem_ceiling: usize,
    #[serde(default)]
    pub stop_policy: StopPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            format: default_format(),
            chunk_size: default_chunk_size(),
            mem_ceiling: default_mem_ceiling(),
            stop_policy: StopPolicy::default(),
        }
    }
}

impl ScanConfig {
    #[must_use]
    pub const fn options(&self) -> ScanOptions {
        ScanOptions {
            chunk_size: self.chunk_size,
            mem_ceiling: self.mem_ceiling,
            stop_policy: self.stop_policy,
        }
    }
}

/// A user-supplied `(name, pattern, layout)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatEntry {
    pub name: String,
    pub pattern: String,
    pub layout: String,
}

impl Config {
    /// Built-in formats with this config's `[[formats]]` merged on top.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::InvalidPattern`] for the first entry whose pattern
    /// does not compile.
    pub fn build_registry(&self) -> Result<FormatTable, TailError> {
        let extra = self
            .formats
            .iter()
            .map(|entry| FormatSpec::new(&entry.name, &entry.pattern, &entry.layout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(registry::merge(registry::register(), extra))
    }
}

/// `$XDG_CONFIG_HOME/timetail/config.toml`, when a config dir exists.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("timetail/config.toml"))
}

/// Load a config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns [`TailError::Config`] if the file exists but cannot be read or
/// parsed.
pub fn load_config(path: &Path) -> Result<Config, TailError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|err| TailError::Config {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    toml::from_str::<Config>(&content).map_err(|err| TailError::Config {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

const fn default_window_secs() -> u64 {
    300
}

fn default_format() -> String {
    "nginx".to_string()
}

const fn default_chunk_size() -> NonZeroUsize {
    DEFAULT_CHUNK_SIZE
}

const fn default_mem_ceiling() -> usize {
    DEFAULT_MEM_CEILING
}
