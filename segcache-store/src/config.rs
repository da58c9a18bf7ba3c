//! Store configuration, optionally read from a TOML file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Tunables for a [`SegmentStore`](crate::SegmentStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Cache backend namespace that holds entity snapshots.
    pub cache_namespace: String,
    /// Root fields starting with this prefix are never merged into entity data.
    pub reserved_prefix: String,
    /// Upper bound on resident store entries. `None` keeps every entry for
    /// the life of the store.
    pub max_entries: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_namespace: "segcache".to_string(),
            reserved_prefix: "_".to_string(),
            max_entries: None,
        }
    }
}

impl StoreConfig {
    /// Parses a configuration from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Loads configuration from `path`.
    /// Falls back to defaults when the file is missing or unreadable.
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No store config at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded store config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!(
                        "Failed to parse store config {:?}: {}. Using defaults.",
                        path, e
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read store config {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Whether `field` carries the reserved prefix.
    pub(crate) fn is_reserved(&self, field: &str) -> bool {
        !self.reserved_prefix.is_empty() && field.starts_with(&self.reserved_prefix)
    }
}
