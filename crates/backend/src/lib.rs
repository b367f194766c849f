//! Backend access for the plot services.
//!
//! Provides:
//! - The `BackendConnection` trait and an HTTP implementation
//! - Fixed-capacity connection pools with scoped checkout
//! - The registry mapping logical data sources to pools
//! - YAML configuration for pools and sources

pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod query;
pub mod record;
pub mod registry;

pub use config::{BackendConfig, DataConfig, SourceConfig};
pub use connection::{BackendConnection, ConnectionConfig, HttpConnection};
pub use error::{BackendError, BackendResult};
pub use pool::{BackendPool, ExhaustionPolicy, PoolSnapshot, PooledConnection};
pub use query::{Action, QueryParams};
pub use record::{BinaryRecord, GenericSeries, Hypocenter, RatioSeries, Stroke};
pub use registry::{DataSourceDescriptor, DataSourceRegistry, RegistryBuilder, VisualizationKind};
