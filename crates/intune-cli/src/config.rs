use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use intune_core::{RankLimit, SimilarityWeights};
use serde::Deserialize;

const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "intune.db";

/// Settings from `config.toml`. Every key is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Database path. Defaults to `<data dir>/intune.db`.
    pub database: Option<PathBuf>,
    pub recommend_limit: usize,
    pub feed_limit: usize,
    pub weights: SimilarityWeights,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: None,
            recommend_limit: 10,
            feed_limit: 20,
            weights: SimilarityWeights::DEFAULT,
        }
    }
}

impl AppConfig {
    /// Load from `explicit`, or from `config.toml` in the data directory.
    /// A missing default file yields defaults; an explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let data_dir = data_dir();
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let p = data_dir.join(CONFIG_FILE);
                if !p.exists() {
                    tracing::debug!("no config at {}, using defaults", p.display());
                    return Ok(Self::default().resolved(&data_dir));
                }
                p
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config.resolved(&data_dir))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.weights = config.weights.validated()?;
        Ok(config)
    }

    fn resolved(mut self, data_dir: &Path) -> Self {
        if self.database.is_none() {
            self.database = Some(data_dir.join(DATABASE_FILE));
        }
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| data_dir().join(DATABASE_FILE))
    }

    pub fn recommend_limit(&self) -> RankLimit {
        RankLimit::new(self.recommend_limit)
    }

    pub fn feed_limit(&self) -> RankLimit {
        RankLimit::new(self.feed_limit)
    }
}

/// `$INTUNE_DATA_DIR`, else `~/.intune`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = env::var("INTUNE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".intune")
}
