//! Station labels of a source's channels, placed on a map.

use std::collections::BTreeSet;

use async_trait::async_trait;
use backend::VisualizationKind;
use plot_common::{
    Channel, ExportTable, GeoLabel, GeoWindow, PanelRequest, ParamPolicy, ParamRule, PlotError,
    PlotResult, SeriesKey, SeriesResult,
};
use projection::MapFrame;

use super::common::{self, parse_window, project_points, DisplayFlags};
use super::{PlotContext, PlotEnv, Plotter, Rendering};
use crate::coords;

const POLICY: ParamPolicy = ParamPolicy::new(&[
    ("subsrc", ParamRule::Optional),
    ("west", ParamRule::Required),
    ("east", ParamRule::Required),
    ("south", ParamRule::Required),
    ("north", ParamRule::Required),
    ("ch", ParamRule::Optional),
]);

#[derive(Debug, Clone)]
pub struct ChannelMapInputs {
    pub window: GeoWindow,
    /// Channel ids to show; every channel when `None`
    pub cids: Option<BTreeSet<u32>>,
    pub display: DisplayFlags,
}

pub struct ChannelMapPlotter;

impl ChannelMapPlotter {
    /// Channels inside the window, restricted to the requested ids.
    fn visible<'a>(&self, inputs: &ChannelMapInputs, channels: &'a [Channel]) -> Vec<&'a Channel> {
        channels
            .iter()
            .filter(|c| inputs.cids.as_ref().map_or(true, |ids| ids.contains(&c.cid)))
            .filter(|c| inputs.window.contains(c.lon, c.lat))
            .collect()
    }

    /// One label per station, first channel wins.
    fn labels(&self, inputs: &ChannelMapInputs, channels: &[Channel]) -> Vec<GeoLabel> {
        let mut seen = BTreeSet::new();
        let labels = channels
            .iter()
            .filter(|c| inputs.cids.as_ref().map_or(true, |ids| ids.contains(&c.cid)))
            .filter(|c| seen.insert(c.station().to_string()))
            .map(|c| GeoLabel::new(c.station(), c.lon, c.lat))
            .collect();
        inputs.window.filter_labels(labels)
    }
}

#[async_trait]
impl Plotter for ChannelMapPlotter {
    type Inputs = ChannelMapInputs;
    type Record = Vec<Channel>;

    fn kind(&self) -> VisualizationKind {
        VisualizationKind::ChannelMap
    }

    fn policy(&self) -> ParamPolicy {
        POLICY
    }

    fn get_inputs(&self, panel: &PanelRequest, _env: &PlotEnv) -> PlotResult<ChannelMapInputs> {
        let params = &panel.params;
        let cids = match params.get("ch")? {
            None => None,
            Some(list) => Some(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<u32>()
                            .map_err(|_| PlotError::invalid("ch", format!("'{}' is not a channel id", s)))
                    })
                    .collect::<PlotResult<BTreeSet<u32>>>()?,
            ),
        };
        Ok(ChannelMapInputs {
            window: parse_window(params)?,
            cids,
            display: DisplayFlags::parse(params)?,
        })
    }

    async fn get_data(&self, ctx: &PlotContext<'_>, _inputs: &ChannelMapInputs) -> PlotResult<Vec<Channel>> {
        let channels = common::channels(ctx).await?;
        Ok(channels.as_ref().clone())
    }

    fn render(
        &self,
        panel: &PanelRequest,
        inputs: &ChannelMapInputs,
        channels: &Vec<Channel>,
    ) -> PlotResult<Rendering> {
        let frame = MapFrame::fit(&inputs.window, &panel.geometry)?;
        let labels = self.labels(inputs, channels);

        let (xs, ys) = project_points(&frame, labels.iter().map(|l| (l.lon, l.lat)));
        let mut series = SeriesResult::new(SeriesKey::Position, xs);
        series.push_column("y", ys)?;
        series.labels.top = Some(format!(
            "{} station{}",
            labels.len(),
            if labels.len() == 1 { "" } else { "s" }
        ));
        series.annotations = labels;

        Ok(Rendering {
            series,
            transform: coords::map(&frame, None),
            display: inputs.display,
        })
    }

    fn export(&self, inputs: &ChannelMapInputs, channels: &Vec<Channel>) -> PlotResult<ExportTable> {
        let mut table = ExportTable::new(["Channel", "Lat", "Lon"]);
        for c in self.visible(inputs, channels) {
            table.push_row(vec![
                c.code.clone(),
                common::format_value(c.lat),
                common::format_value(c.lon),
            ])?;
        }
        Ok(table)
    }
}
