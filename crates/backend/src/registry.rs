//! Registry of logical data sources and the pools serving them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::DataConfig;
use crate::connection::{BackendConnection, HttpConnection};
use crate::error::{BackendError, BackendResult};
use crate::pool::{BackendPool, ExhaustionPolicy, PoolSnapshot, PooledConnection};

/// Which plotter handles a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationKind {
    Hypocenter,
    Lightning,
    Ratsam,
    Generic,
    ChannelMap,
}

impl VisualizationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizationKind::Hypocenter => "hypocenter",
            VisualizationKind::Lightning => "lightning",
            VisualizationKind::Ratsam => "ratsam",
            VisualizationKind::Generic => "generic",
            VisualizationKind::ChannelMap => "channel_map",
        }
    }
}

/// Immutable description of one logical source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSourceDescriptor {
    pub name: String,
    /// Name of the pool that serves this source
    pub backend: String,
    /// Identifier the backend knows the source by
    pub remote_source: String,
    pub kind: VisualizationKind,
    pub settings: BTreeMap<String, String>,
}

impl DataSourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        backend: impl Into<String>,
        remote_source: impl Into<String>,
        kind: VisualizationKind,
    ) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            remote_source: remote_source.into(),
            kind,
            settings: BTreeMap::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Read-only after construction; lookups never do I/O.
#[derive(Debug, Default)]
pub struct DataSourceRegistry {
    pools: HashMap<String, BackendPool>,
    sources: HashMap<String, DataSourceDescriptor>,
}

impl DataSourceRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build HTTP-backed pools and descriptors from configuration.
    pub fn from_config(config: &DataConfig, policy: ExhaustionPolicy) -> BackendResult<Self> {
        config.validate()?;
        let mut builder = Self::builder();

        for backend in &config.backends {
            let conn_config = backend.connection();
            let connections = (0..backend.clients)
                .map(|_| {
                    HttpConnection::new(&backend.name, &conn_config)
                        .map(|c| Box::new(c) as Box<dyn BackendConnection>)
                })
                .collect::<BackendResult<Vec<_>>>()?;
            info!(
                backend = %backend.name,
                url = %conn_config.base_url(),
                clients = backend.clients,
                timeout_ms = backend.timeout_ms,
                "Created backend pool"
            );
            builder = builder.pool(BackendPool::new(&backend.name, connections, policy));
        }

        for source in &config.sources {
            let mut descriptor = DataSourceDescriptor::new(
                &source.name,
                &source.backend,
                &source.source,
                source.plotter,
            );
            descriptor.settings = source.settings.clone();
            builder = builder.source(descriptor);
        }

        Ok(builder.build())
    }

    /// Look up a source by logical name.
    pub fn descriptor(&self, name: &str) -> Option<&DataSourceDescriptor> {
        self.sources.get(name)
    }

    /// Look up a pool by name.
    pub fn pool(&self, name: &str) -> BackendResult<&BackendPool> {
        self.pools
            .get(name)
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))
    }

    /// Check out a connection from the named pool.
    pub async fn acquire(&self, pool: &str) -> BackendResult<PooledConnection<'_>> {
        self.pool(pool)?.acquire().await
    }

    /// Source names, sorted.
    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn sources(&self) -> impl Iterator<Item = &DataSourceDescriptor> {
        self.sources.values()
    }

    /// Snapshots of every pool, sorted by name.
    pub fn pool_snapshots(&self) -> Vec<PoolSnapshot> {
        let mut snaps: Vec<PoolSnapshot> = self.pools.values().map(BackendPool::snapshot).collect();
        snaps.sort_by(|a, b| a.name.cmp(&b.name));
        snaps
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    pools: HashMap<String, BackendPool>,
    sources: HashMap<String, DataSourceDescriptor>,
}

impl RegistryBuilder {
    pub fn pool(mut self, pool: BackendPool) -> Self {
        self.pools.insert(pool.name().to_string(), pool);
        self
    }

    pub fn source(mut self, descriptor: DataSourceDescriptor) -> Self {
        debug!(
            source = %descriptor.name,
            backend = %descriptor.backend,
            kind = descriptor.kind.as_str(),
            "Registered data source"
        );
        self.sources.insert(descriptor.name.clone(), descriptor);
        self
    }

    pub fn build(self) -> DataSourceRegistry {
        DataSourceRegistry {
            pools: self.pools,
            sources: self.sources,
        }
    }
}
