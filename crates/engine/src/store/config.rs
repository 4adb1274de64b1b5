//! Cache configuration via `searchcache.toml`
//!
//! On first open of a data directory a default `searchcache.toml` is
//! created. To change settings, edit the file and reopen the store.

use std::path::Path;

use searchcache_core::{Error, Result};
use searchcache_durability::DurabilityMode;
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_APPEND_RETRIES;

/// Config file name placed in the cache data directory.
pub const CONFIG_FILE_NAME: &str = "searchcache.toml";

/// Batch log file name placed in the cache data directory.
pub const LOG_FILE_NAME: &str = "results.log";

/// Cache configuration loaded from `searchcache.toml`.
///
/// # Example
///
/// ```toml
/// durability = "always"
/// append_retries = 8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Durability mode: `"ephemeral"`, `"always"` or `"buffered"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// How many times `append_next` retries after losing an order race.
    #[serde(default = "default_append_retries")]
    pub append_retries: u32,
}

fn default_durability_str() -> String {
    DurabilityMode::default().as_str().to_string()
}

fn default_append_retries() -> u32 {
    DEFAULT_APPEND_RETRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            append_retries: default_append_retries(),
        }
    }
}

impl CacheConfig {
    /// Config for a cache that keeps no log
    pub fn ephemeral() -> Self {
        Self {
            durability: DurabilityMode::Ephemeral.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a known mode.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        DurabilityMode::parse(&self.durability).ok_or_else(|| {
            Error::invalid_input(format!(
                "Invalid durability mode '{}' in {}. Expected \"ephemeral\", \"always\" or \"buffered\".",
                self.durability, CONFIG_FILE_NAME
            ))
        })
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# SearchCache configuration
#
# Durability mode: "always" (default), "buffered" or "ephemeral"
#   "always"    = fsync the batch log on every commit, zero data loss
#   "buffered"  = hand every commit to the OS, fsync on close
#   "ephemeral" = keep no log, the cache is empty after restart
durability = "always"

# Retries for append_next when a concurrent producer took the same orders
append_retries = 8
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::storage(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: CacheConfig = toml::from_str(&content).map_err(|e| {
            Error::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        // Validate the durability value eagerly
        config.durability_mode()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::storage(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::storage(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::storage(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
