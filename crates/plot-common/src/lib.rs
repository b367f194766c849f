//! Common types and utilities shared across the plot services.

pub mod binning;
pub mod channel;
pub mod error;
pub mod geo_window;
pub mod panel;
pub mod rank;
pub mod series;
pub mod time;
pub mod transform;

pub use binning::{cumulative, Histogram, TimeBin, MAX_BUCKETS};
pub use channel::Channel;
pub use error::{PlotError, PlotResult};
pub use geo_window::{GeoLabel, GeoWindow, GeoWindowError};
pub use panel::{OutputMode, PanelGeometry, PanelRequest, ParamBag, ParamPolicy, ParamRule};
pub use rank::{resolve_rank, Rank};
pub use series::{AxisRange, ExportTable, PlotLabels, SeriesColumn, SeriesKey, SeriesResult};
pub use time::{TimeRange, TimeZoneSpec};
pub use transform::{TransformKind, TransformVector};
