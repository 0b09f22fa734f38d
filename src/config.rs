//! Engine configuration, loaded from TOML.
//!
//! ```toml
//! path = "data/acl"
//! map_size = 1073741824
//! max_readers = 126
//! store_timeout_ms = 5000
//!
//! [hierarchy]
//! experiment = "project"
//! run = "project"
//! artifact = "project"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAP_SIZE, DEFAULT_MAX_READERS, DEFAULT_STORE_TIMEOUT};
use crate::error::{AclError, Result};
use crate::identity::Hierarchy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AclConfig {
    /// LMDB directory
    pub path: PathBuf,
    #[serde(default = "default_map_size")]
    pub map_size: usize,
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default)]
    pub hierarchy: Hierarchy,
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

fn default_max_readers() -> u32 {
    DEFAULT_MAX_READERS
}

fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT.as_millis() as u64
}

impl AclConfig {
    /// Defaults for everything but the path
    pub fn new(path: impl AsRef<Path>) -> Self {
        AclConfig {
            path: path.as_ref().to_path_buf(),
            map_size: DEFAULT_MAP_SIZE,
            max_readers: DEFAULT_MAX_READERS,
            store_timeout_ms: default_store_timeout_ms(),
            hierarchy: Hierarchy::default(),
        }
    }

    pub fn with_hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AclConfig = toml::from_str(s).map_err(|e| AclError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AclError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AclError::Config("path cannot be empty".into()));
        }
        if self.map_size == 0 {
            return Err(AclError::Config("map_size must be positive".into()));
        }
        if self.max_readers == 0 {
            return Err(AclError::Config("max_readers must be positive".into()));
        }
        if self.store_timeout_ms == 0 {
            return Err(AclError::Config("store_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
