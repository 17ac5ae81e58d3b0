//! Configuration types deserialized from `stabil.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stabil_source::BlockPolicy;

/// The top-level project configuration parsed from `stabil.toml`.
///
/// Every section is optional; a missing file and an empty file mean the same thing.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Where session data is stored.
    #[serde(default)]
    pub data: DataConfig,
    /// Which files are fingerprinted and how.
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// Location and scoping of the data file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Data file path, relative to the project root unless absolute.
    #[serde(default = "default_data_path")]
    pub path: PathBuf,
    /// Environment label isolating records of different interpreters or setups.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
            environment: default_environment(),
        }
    }
}

impl DataConfig {
    /// Resolves the data file path against the project root.
    pub fn resolve_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path)
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from(".stabildata")
}

fn default_environment() -> String {
    "default".to_string()
}

/// Source tracking settings.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    /// Root-relative directories to fingerprint. Empty tracks the whole root.
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
    /// How source files are split into blocks.
    #[serde(default)]
    pub block_policy: BlockPolicy,
}
