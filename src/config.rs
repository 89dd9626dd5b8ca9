use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scoring::{self, ScoringConfig};

const DEFAULT_DB_NAME: &str = "chemi.db";
const DEFAULT_SCORING_FILE: &str = "scoring.json";
const DEFAULT_CONTENT_DIR: &str = "content";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scoring config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scoring config {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: scoring::ConfigError,
    },
}

/// Everything the CLI needs to locate its data.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub content_dir: PathBuf,
    pub scoring: ScoringConfig,
}

impl Settings {
    /// Resolve settings from CLI overrides, then `CHEMI_*` environment
    /// variables, then defaults under the user config directory.
    pub fn load(content_override: Option<PathBuf>) -> Result<Self, ConfigError> {
        let content_dir = resolve_content_dir(
            content_override,
            std::env::var_os("CHEMI_CONTENT").map(PathBuf::from),
        );
        let scoring = resolve_scoring(
            std::env::var_os("CHEMI_CONFIG").map(PathBuf::from),
            dirs::config_dir().map(|d| d.join("chemi").join(DEFAULT_SCORING_FILE)),
        )?;

        let settings = Self {
            db_path: get_db_path(),
            content_dir,
            scoring,
        };
        tracing::debug!(?settings, "settings resolved");
        Ok(settings)
    }
}

fn resolve_content_dir(flag: Option<PathBuf>, env: Option<PathBuf>) -> PathBuf {
    flag.or(env).unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR))
}

// An explicitly named file must load; the implicit one is optional
fn resolve_scoring(
    explicit: Option<PathBuf>,
    implicit: Option<PathBuf>,
) -> Result<ScoringConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_scoring(&path);
    }
    match implicit {
        Some(path) if path.exists() => load_scoring(&path),
        Some(path) => {
            tracing::debug!(path = %path.display(), "no scoring config, using defaults");
            Ok(ScoringConfig::default())
        }
        None => Ok(ScoringConfig::default()),
    }
}

pub fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("CHEMI_DB") {
        return PathBuf::from(path);
    }

    let dir = config_dir();
    fs::create_dir_all(&dir).ok();
    dir.join(DEFAULT_DB_NAME)
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chemi")
}

pub fn load_scoring(path: &Path) -> Result<ScoringConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ScoringConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate().map_err(|source| ConfigError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}
