//! # Sync Configuration
//!
//! Loaded once at startup. Nothing here is read on the hot path.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Configuration for the sync point, the core thread and background render tasks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Initial capacity of each frame allocator, in bytes.
    pub frame_alloc_capacity: usize,
    /// Sync batches the core thread may have queued before `submit` blocks.
    pub batch_queue_depth: usize,
    /// Light probes rendered per core-thread step.
    pub probe_render_batch: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            frame_alloc_capacity: 1024 * 1024,
            batch_queue_depth: 2,
            probe_render_batch: 8,
        }
    }
}

impl SyncConfig {
    /// Parses a configuration from TOML text. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` if the text is not valid TOML, or if
    /// a value is out of range.
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the file cannot be read, otherwise the same
    /// errors as [`SyncConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> CoreResult<()> {
        if self.batch_queue_depth == 0 {
            return Err(CoreError::InvalidConfig(
                "batch_queue_depth must be at least 1".to_string(),
            ));
        }
        if self.probe_render_batch == 0 {
            return Err(CoreError::InvalidConfig(
                "probe_render_batch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_parses() {
        let config = SyncConfig::from_toml_str(include_str!("../../../config/sync.toml")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = SyncConfig::from_toml_str("probe_render_batch = 32").unwrap();
        assert_eq!(config.probe_render_batch, 32);
        assert_eq!(config.batch_queue_depth, 2);
    }

    #[test]
    fn test_rejects_zero_queue_depth() {
        let err = SyncConfig::from_toml_str("batch_queue_depth = 0").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(SyncConfig::from_toml_str("frame_alloc_capacity = \"lots\"").is_err());
    }
}
