//! The plot pipeline over a whole combined request.
//!
//! Every panel is resolved and validated before any backend is touched,
//! then panels run one after another. The first failure aborts the
//! request in both output modes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backend::{DataSourceRegistry, VisualizationKind};
use plot_common::time::now_j2k;
use plot_common::{ExportTable, OutputMode, PlotError, TimeZoneSpec};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::SourceCaches;
use crate::decomposer::{decompose, is_channel_map};
use crate::export;
use crate::plotters::{self, PanelOutput, PlotContext, PlotEnv, RenderedPanel};

/// A failed request, naming the panel when the failure belongs to one.
#[derive(Debug)]
pub struct PanelFailure {
    pub panel: Option<usize>,
    pub error: PlotError,
}

impl PanelFailure {
    fn request(error: PlotError) -> Self {
        Self { panel: None, error }
    }

    fn panel(index: usize) -> impl FnOnce(PlotError) -> Self {
        move |error| Self {
            panel: Some(index),
            error,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        self.error.http_status_code()
    }

    /// The structured body sent to clients.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error.to_string(),
            code: self.error.error_code(),
            panel: self.panel,
        }
    }
}

impl fmt::Display for PanelFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.panel {
            Some(i) => write!(f, "panel {}: {}", i, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for PanelFailure {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<usize>,
}

/// Result of a successful request; which variant is fixed by its mode.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotOutcome {
    Rendered(Vec<RenderedPanel>),
    /// CSV text
    Exported(String),
}

impl PlotOutcome {
    pub fn mode(&self) -> OutputMode {
        match self {
            PlotOutcome::Rendered(_) => OutputMode::Render,
            PlotOutcome::Exported(_) => OutputMode::Export,
        }
    }
}

pub struct PlotService {
    registry: Arc<DataSourceRegistry>,
    caches: SourceCaches,
    default_tz: TimeZoneSpec,
}

impl PlotService {
    pub fn new(registry: Arc<DataSourceRegistry>, cache_ttl: Duration, default_tz: TimeZoneSpec) -> Self {
        Self {
            registry,
            caches: SourceCaches::new(cache_ttl),
            default_tz,
        }
    }

    pub fn registry(&self) -> &DataSourceRegistry {
        &self.registry
    }

    pub fn caches(&self) -> &SourceCaches {
        &self.caches
    }

    pub async fn plot(&self, pairs: &[(String, String)]) -> Result<PlotOutcome, PanelFailure> {
        self.plot_at(pairs, now_j2k()).await
    }

    /// Run a request with `now` (J2K seconds) as the current time.
    pub async fn plot_at(&self, pairs: &[(String, String)], now: f64) -> Result<PlotOutcome, PanelFailure> {
        let request = decompose(pairs).map_err(PanelFailure::request)?;
        let env = PlotEnv {
            default_tz: self.default_tz.clone(),
            now,
        };

        let mut plan = Vec::with_capacity(request.panels.len());
        for panel in &request.panels {
            let descriptor = self
                .registry
                .descriptor(&panel.source)
                .ok_or_else(|| PlotError::UnknownSource(panel.source.clone()))
                .map_err(PanelFailure::panel(panel.index))?;
            let kind = if is_channel_map(panel) {
                VisualizationKind::ChannelMap
            } else {
                descriptor.kind
            };
            plotters::validate(kind, panel, &env).map_err(PanelFailure::panel(panel.index))?;
            plan.push((panel, descriptor, kind));
        }
        debug!(panels = plan.len(), mode = ?request.mode, "Request validated");

        let mut outputs = Vec::with_capacity(plan.len());
        for (panel, descriptor, kind) in plan {
            let ctx = PlotContext {
                registry: &self.registry,
                descriptor,
                caches: &self.caches,
            };
            let output = plotters::run(kind, &ctx, panel, &env).await.map_err(|e| {
                warn!(
                    panel = panel.index,
                    source = %panel.source,
                    kind = kind.as_str(),
                    error = %e,
                    "Panel failed"
                );
                PanelFailure::panel(panel.index)(e)
            })?;
            info!(panel = panel.index, source = %panel.source, kind = kind.as_str(), "Panel complete");
            outputs.push((panel.source.clone(), output));
        }

        match request.mode {
            OutputMode::Render => Ok(PlotOutcome::Rendered(
                outputs
                    .into_iter()
                    .filter_map(|(_, out)| match out {
                        PanelOutput::Rendered(r) => Some(r),
                        PanelOutput::Exported(_) => None,
                    })
                    .collect(),
            )),
            OutputMode::Export => {
                let tables: Vec<(String, ExportTable)> = outputs
                    .into_iter()
                    .filter_map(|(source, out)| match out {
                        PanelOutput::Exported(t) => Some((source, t)),
                        PanelOutput::Rendered(_) => None,
                    })
                    .collect();
                let csv = export::to_csv(&export::combine(&tables)).map_err(PanelFailure::request)?;
                Ok(PlotOutcome::Exported(csv))
            }
        }
    }
}
