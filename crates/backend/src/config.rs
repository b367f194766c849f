//! Data source configuration.
//!
//! Loaded once at startup from a YAML file of this shape:
//!
//! ```yaml
//! backends:
//!   - name: hvo
//!     host: vdx.local
//!     port: 16099
//!     clients: 4
//!     timeout_ms: 60000
//! sources:
//!   - name: quakes
//!     backend: hvo
//!     source: hypocenters_hvo
//!     plotter: hypocenter
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::connection::{ConnectionConfig, DEFAULT_CLIENTS, DEFAULT_TIMEOUT_MS};
use crate::error::{BackendError, BackendResult};
use crate::registry::VisualizationKind;

fn default_clients() -> usize {
    DEFAULT_CLIENTS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// One backend cluster and the size of its pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Number of pooled connections
    #[serde(default = "default_clients")]
    pub clients: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl BackendConfig {
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            timeout_ms: self.timeout_ms,
        }
    }
}

/// One logical data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub backend: String,
    /// Identifier the backend knows the source by
    pub source: String,
    pub plotter: VisualizationKind,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl DataConfig {
    pub fn from_yaml(text: &str) -> BackendResult<Self> {
        serde_yaml::from_str(text).map_err(|e| BackendError::config(format!("Invalid YAML: {}", e)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> BackendResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            BackendError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&text)?;
        config.validate()?;
        info!(
            path = %path.display(),
            backends = config.backends.len(),
            sources = config.sources.len(),
            "Loaded data configuration"
        );
        Ok(config)
    }

    /// Reject duplicate names and empty pools.
    ///
    /// A source naming an undefined backend is only warned about; requests
    /// for it fail with "unknown backend".
    pub fn validate(&self) -> BackendResult<()> {
        let mut backends = HashSet::new();
        for b in &self.backends {
            if !backends.insert(b.name.as_str()) {
                return Err(BackendError::config(format!("Duplicate backend: {}", b.name)));
            }
            if b.clients == 0 {
                return Err(BackendError::config(format!(
                    "Backend {} must have at least one client",
                    b.name
                )));
            }
        }

        let mut sources = HashSet::new();
        for s in &self.sources {
            if !sources.insert(s.name.as_str()) {
                return Err(BackendError::config(format!("Duplicate source: {}", s.name)));
            }
            if !backends.contains(s.backend.as_str()) {
                warn!(source = %s.name, backend = %s.backend, "Source references undefined backend");
            }
        }
        Ok(())
    }
}
