use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Which shard files this process owns and how to load them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// This process's shard.
    pub shard_index: u32,
    /// Total number of shards.
    pub shard_number: u32,
    /// Load distinct indexes on the rayon pool.
    pub parallel: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            shard_index: 0,
            shard_number: 1,
            parallel: true,
        }
    }
}

impl LoaderConfig {
    pub fn new(shard_index: u32, shard_number: u32) -> Self {
        Self {
            shard_index,
            shard_number,
            ..Self::default()
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| IndexError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shard_number == 0 {
            return Err(IndexError::Config {
                message: "shard_number must be positive".to_string(),
            });
        }
        if self.shard_index >= self.shard_number {
            return Err(IndexError::Config {
                message: format!(
                    "shard_index {} out of range for {} shards",
                    self.shard_index, self.shard_number
                ),
            });
        }
        Ok(())
    }

    /// Whether partial file number `n` belongs to this shard.
    pub fn owns(&self, n: u64) -> bool {
        n % u64::from(self.shard_number) == u64::from(self.shard_index)
    }
}
