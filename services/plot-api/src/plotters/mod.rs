//! Plotters: one per visualization kind.
//!
//! Every kind runs the same three steps:
//! 1. `get_inputs` parses and validates the panel's parameters (no I/O)
//! 2. `get_data` checks out a backend connection, issues one query and
//!    returns the connection before transforming anything
//! 3. `render` or `export` turns the record into series or rows

pub mod channel_map;
pub mod common;
pub mod generic;
pub mod hypocenter;
pub mod lightning;
pub mod ratsam;

use async_trait::async_trait;
use backend::{DataSourceDescriptor, DataSourceRegistry, VisualizationKind};
use plot_common::{
    ExportTable, OutputMode, PanelGeometry, PanelRequest, ParamPolicy, PlotResult, SeriesResult,
    TimeZoneSpec, TransformVector,
};
use serde::Serialize;

use crate::cache::SourceCaches;
pub use common::DisplayFlags;

pub use channel_map::ChannelMapPlotter;
pub use generic::GenericPlotter;
pub use hypocenter::HypocenterPlotter;
pub use lightning::LightningPlotter;
pub use ratsam::RatSamPlotter;

/// Request-independent inputs to parameter parsing.
#[derive(Debug, Clone)]
pub struct PlotEnv {
    /// Zone used when a panel has no `tz`
    pub default_tz: TimeZoneSpec,
    /// Current time in J2K seconds
    pub now: f64,
}

/// What a plotter may touch while fetching data.
pub struct PlotContext<'a> {
    pub registry: &'a DataSourceRegistry,
    pub descriptor: &'a DataSourceDescriptor,
    pub caches: &'a SourceCaches,
}

/// Render-mode output of one panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedPanel {
    pub index: usize,
    pub source: String,
    pub kind: VisualizationKind,
    pub geometry: PanelGeometry,
    pub series: SeriesResult,
    pub transform: TransformVector,
    pub display: DisplayFlags,
}

/// Output of one panel; which variant is fixed per request.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelOutput {
    Rendered(RenderedPanel),
    Exported(ExportTable),
}

/// Series, transform and display flags produced by `render`.
pub struct Rendering {
    pub series: SeriesResult,
    pub transform: TransformVector,
    pub display: DisplayFlags,
}

#[async_trait]
pub trait Plotter: Send + Sync {
    type Inputs: Send + Sync;
    type Record: Send;

    fn kind(&self) -> VisualizationKind;

    /// Which parameters are required, optional or forbidden.
    fn policy(&self) -> ParamPolicy;

    fn get_inputs(&self, panel: &PanelRequest, env: &PlotEnv) -> PlotResult<Self::Inputs>;

    async fn get_data(&self, ctx: &PlotContext<'_>, inputs: &Self::Inputs) -> PlotResult<Self::Record>;

    fn render(
        &self,
        panel: &PanelRequest,
        inputs: &Self::Inputs,
        record: &Self::Record,
    ) -> PlotResult<Rendering>;

    fn export(&self, inputs: &Self::Inputs, record: &Self::Record) -> PlotResult<ExportTable>;
}

/// Policy check plus input parsing, without touching the backend.
pub fn validate_with<P: Plotter>(plotter: &P, panel: &PanelRequest, env: &PlotEnv) -> PlotResult<P::Inputs> {
    plotter.policy().check(&panel.params)?;
    plotter.get_inputs(panel, env)
}

/// Run all three steps for one panel.
pub async fn run_with<P: Plotter>(
    plotter: &P,
    ctx: &PlotContext<'_>,
    panel: &PanelRequest,
    env: &PlotEnv,
) -> PlotResult<PanelOutput> {
    let inputs = validate_with(plotter, panel, env)?;
    let record = plotter.get_data(ctx, &inputs).await?;
    match panel.mode {
        OutputMode::Render => {
            let rendering = plotter.render(panel, &inputs, &record)?;
            Ok(PanelOutput::Rendered(RenderedPanel {
                index: panel.index,
                source: panel.source.clone(),
                kind: plotter.kind(),
                geometry: panel.geometry,
                series: rendering.series,
                transform: rendering.transform,
                display: rendering.display,
            }))
        }
        OutputMode::Export => Ok(PanelOutput::Exported(plotter.export(&inputs, &record)?)),
    }
}

/// Validate a panel with the plotter for `kind`.
pub fn validate(kind: VisualizationKind, panel: &PanelRequest, env: &PlotEnv) -> PlotResult<()> {
    match kind {
        VisualizationKind::Hypocenter => validate_with(&HypocenterPlotter, panel, env).map(drop),
        VisualizationKind::Lightning => validate_with(&LightningPlotter, panel, env).map(drop),
        VisualizationKind::Ratsam => validate_with(&RatSamPlotter, panel, env).map(drop),
        VisualizationKind::Generic => validate_with(&GenericPlotter, panel, env).map(drop),
        VisualizationKind::ChannelMap => validate_with(&ChannelMapPlotter, panel, env).map(drop),
    }
}

/// Run a panel with the plotter for `kind`.
pub async fn run(
    kind: VisualizationKind,
    ctx: &PlotContext<'_>,
    panel: &PanelRequest,
    env: &PlotEnv,
) -> PlotResult<PanelOutput> {
    match kind {
        VisualizationKind::Hypocenter => run_with(&HypocenterPlotter, ctx, panel, env).await,
        VisualizationKind::Lightning => run_with(&LightningPlotter, ctx, panel, env).await,
        VisualizationKind::Ratsam => run_with(&RatSamPlotter, ctx, panel, env).await,
        VisualizationKind::Generic => run_with(&GenericPlotter, ctx, panel, env).await,
        VisualizationKind::ChannelMap => run_with(&ChannelMapPlotter, ctx, panel, env).await,
    }
}
