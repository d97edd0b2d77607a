//! Engine configuration from the environment.
//!
//! Supported environment variables:
//! - `SAGA_RULESET_PATH`: JSON file overriding the core ruleset. Omitted
//!   fields keep their core-rules values.
//! - `SAGA_LOG_FILTER`: tracing filter directives for the binary.
//!
//! `.env.local` and `.env` at the repository root are loaded first; values
//! already present in the process environment win. A malformed `.env` file
//! is an error.

use std::path::{Path, PathBuf};

use saga_domain::Ruleset;
use serde::de::DeserializeOwned;

pub const DEFAULT_LOG_FILTER: &str = "saga_engine=info,saga_domain=info";

const RULESET_PATH_VAR: &str = "SAGA_RULESET_PATH";
const LOG_FILTER_VAR: &str = "SAGA_LOG_FILTER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to load {}: {source}", path.display())]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Ruleset override file, `None` for the core rules
    pub ruleset_path: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ruleset_path: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load `.env` files, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv_from_repo_root()?;
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            ruleset_path: read(RULESET_PATH_VAR).map(PathBuf::from),
            log_filter: read(LOG_FILTER_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// The configured ruleset. A missing path means the core rules; a path
    /// that cannot be read or parsed is an error, never a silent fallback.
    pub fn load_ruleset(&self) -> Result<Ruleset, ConfigError> {
        match &self.ruleset_path {
            Some(path) => {
                let rules = read_json_file(path)?;
                tracing::info!(path = %path.display(), "Loaded ruleset override");
                Ok(rules)
            }
            None => Ok(Ruleset::default()),
        }
    }
}

/// Read and deserialize one JSON document.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn load_dotenv_from_repo_root() -> Result<(), ConfigError> {
    let repo_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");

    // Prefer local overrides.
    load_dotenv_files([".env.local", ".env"].map(|filename| repo_root.join(filename)))
}

/// Load each existing file in order. Absent files are skipped.
fn load_dotenv_files(paths: impl IntoIterator<Item = PathBuf>) -> Result<(), ConfigError> {
    for path in paths {
        if path.exists() {
            dotenvy::from_path(&path).map_err(|source| ConfigError::Dotenv { path, source })?;
        }
    }
    Ok(())
}
