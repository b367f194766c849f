//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;

use backend::{DataConfig, DataSourceRegistry};

use crate::config::ServiceConfig;
use crate::metrics::MetricsCollector;
use crate::service::PlotService;

/// Shared application state.
pub struct AppState {
    pub service: PlotService,
    pub metrics: Arc<MetricsCollector>,
    pub config: ServiceConfig,
}

impl AppState {
    /// Load the data configuration and open every backend pool.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let data_config = DataConfig::load(&config.data_config)
            .with_context(|| format!("Failed to load {}", config.data_config.display()))?;
        let registry = DataSourceRegistry::from_config(&data_config, config.exhaustion_policy())
            .context("Failed to build data source registry")?;
        Self::with_registry(Arc::new(registry), config)
    }

    /// Build state around an existing registry.
    pub fn with_registry(registry: Arc<DataSourceRegistry>, config: ServiceConfig) -> Result<Self> {
        let default_tz = config.time_zone().map_err(anyhow::Error::msg)?;
        let service = PlotService::new(registry, config.cache_ttl(), default_tz);
        Ok(Self {
            service,
            metrics: Arc::new(MetricsCollector::new()),
            config,
        })
    }
}
