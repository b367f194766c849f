//! Earthquake hypocenters: map and cross-section views, or event counts.

use async_trait::async_trait;
use backend::{Action, BinaryRecord, Hypocenter, VisualizationKind};
use plot_common::binning::moment;
use plot_common::time::format_timestamp;
use plot_common::{
    AxisRange, ExportTable, GeoWindow, PanelRequest, ParamPolicy, ParamRule, PlotError, PlotResult,
    Rank, SeriesKey, SeriesResult, TimeBin,
};
use projection::MapFrame;

use super::common::{
    self, add_window_to_query, parse_choice, parse_rank_id, parse_window, project_points,
    unwrap_longitude, BinnedCounts, DisplayFlags, TimeInputs,
};
use super::{PlotContext, PlotEnv, Plotter, Rendering};
use crate::coords;

const POLICY: ParamPolicy = ParamPolicy::new(&[
    ("st", ParamRule::Required),
    ("et", ParamRule::Optional),
    ("tz", ParamRule::Optional),
    ("west", ParamRule::Required),
    ("east", ParamRule::Required),
    ("south", ParamRule::Required),
    ("north", ParamRule::Required),
    ("rk", ParamRule::Optional),
    ("plotType", ParamRule::Optional),
    ("axes", ParamRule::Optional),
    ("c", ParamRule::Optional),
    ("cntsBin", ParamRule::Optional),
    ("cntsAxis", ParamRule::Optional),
    ("rmk", ParamRule::Optional),
    ("minMag", ParamRule::Optional),
    ("maxMag", ParamRule::Optional),
    ("minDepth", ParamRule::Optional),
    ("maxDepth", ParamRule::Optional),
    ("minNPhases", ParamRule::Optional),
    ("maxNPhases", ParamRule::Optional),
    ("minRMS", ParamRule::Optional),
    ("maxRMS", ParamRule::Optional),
    ("minHerr", ParamRule::Optional),
    ("maxHerr", ParamRule::Optional),
    ("minVerr", ParamRule::Optional),
    ("maxVerr", ParamRule::Optional),
]);

const UNBOUNDED: (f64, f64) = (f64::NEG_INFINITY, f64::INFINITY);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotType {
    Map,
    Counts,
}

/// Map view and cross-sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axes {
    /// Plan view
    Map,
    /// Longitude against depth
    LonDepth,
    /// Latitude against depth
    LatDepth,
    /// Time against depth
    TimeDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBy {
    Auto,
    Depth,
    Time,
    Mono,
}

/// What the right axis of a counts plot accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightAxis {
    None,
    Count,
    Magnitude,
    Moment,
}

impl RightAxis {
    fn label(&self) -> &'static str {
        match self {
            RightAxis::None => "",
            RightAxis::Count => "Cumulative Counts",
            RightAxis::Magnitude => "Cumulative Magnitude",
            RightAxis::Moment => "Cumulative Moment (N-m)",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            RightAxis::None => "",
            RightAxis::Count => "CumulativeCounts",
            RightAxis::Magnitude => "CumulativeMagnitude",
            RightAxis::Moment => "CumulativeMoment",
        }
    }

    fn weight(&self, event: &Hypocenter) -> f64 {
        match self {
            RightAxis::None | RightAxis::Count => 1.0,
            RightAxis::Magnitude => event.magnitude,
            RightAxis::Moment => moment(event.magnitude),
        }
    }
}

/// Optional min/max filters forwarded to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Filters {
    pub magnitude: (f64, f64),
    pub depth: (f64, f64),
    pub nphases: (f64, f64),
    pub rms: (f64, f64),
    pub herr: (f64, f64),
    pub verr: (f64, f64),
}

impl Filters {
    fn parse(params: &plot_common::ParamBag) -> PlotResult<Self> {
        Ok(Self {
            magnitude: params.range_f64("minMag", "maxMag", "magnitude", UNBOUNDED)?,
            depth: params.range_f64("minDepth", "maxDepth", "depth", UNBOUNDED)?,
            nphases: params.range_f64("minNPhases", "maxNPhases", "phases", UNBOUNDED)?,
            rms: params.range_f64("minRMS", "maxRMS", "RMS", UNBOUNDED)?,
            herr: params.range_f64("minHerr", "maxHerr", "horizontal error", UNBOUNDED)?,
            verr: params.range_f64("minVerr", "maxVerr", "vertical error", UNBOUNDED)?,
        })
    }

    fn add_to_query(&self, query: &mut backend::QueryParams) {
        let mut bound = |key: &str, v: f64| {
            if v.is_finite() {
                query.set(key, v);
            }
        };
        bound("minMag", self.magnitude.0);
        bound("maxMag", self.magnitude.1);
        // Depths are stored as elevations.
        bound("minDepth", -self.depth.1);
        bound("maxDepth", -self.depth.0);
        bound("minNPhases", self.nphases.0);
        bound("maxNPhases", self.nphases.1);
        bound("minRMS", self.rms.0);
        bound("maxRMS", self.rms.1);
        bound("minHerr", self.herr.0);
        bound("maxHerr", self.herr.1);
        bound("minVerr", self.verr.0);
        bound("maxVerr", self.verr.1);
    }
}

#[derive(Debug, Clone)]
pub struct HypocenterInputs {
    pub time: TimeInputs,
    pub window: GeoWindow,
    pub rank_id: u32,
    pub plot_type: PlotType,
    pub axes: Axes,
    pub color: ColorBy,
    pub bin: TimeBin,
    pub right_axis: RightAxis,
    pub filters: Filters,
    pub remark: Option<String>,
    pub display: DisplayFlags,
}

#[derive(Debug, Clone)]
pub struct HypocenterData {
    pub rank: Rank,
    pub events: Vec<Hypocenter>,
}

pub struct HypocenterPlotter;

#[async_trait]
impl Plotter for HypocenterPlotter {
    type Inputs = HypocenterInputs;
    type Record = HypocenterData;

    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Hypocenter
    }

    fn policy(&self) -> ParamPolicy {
        POLICY
    }

    fn get_inputs(&self, panel: &PanelRequest, env: &PlotEnv) -> PlotResult<HypocenterInputs> {
        let params = &panel.params;
        let time = TimeInputs::parse(params, env)?;
        let window = parse_window(params)?;

        let plot_type = match params.get_str_or("plotType", "map")? {
            "map" => PlotType::Map,
            "cnts" => PlotType::Counts,
            other => {
                return Err(PlotError::invalid("plotType", format!("unknown plot type '{}'", other)))
            }
        };

        let bin_name = params.get_str_or("cntsBin", "day")?;
        let bin = TimeBin::parse(bin_name)
            .ok_or_else(|| PlotError::invalid("cntsBin", format!("unknown bin '{}'", bin_name)))?;
        if plot_type == PlotType::Counts {
            bin.validate_range(&time.range)?;
        }

        Ok(HypocenterInputs {
            axes: parse_choice(params, "axes", Axes::Map, |v| match v {
                "M" => Some(Axes::Map),
                "E" => Some(Axes::LonDepth),
                "N" => Some(Axes::LatDepth),
                "T" => Some(Axes::TimeDepth),
                _ => None,
            })?,
            color: parse_choice(params, "c", ColorBy::Auto, |v| match v {
                "A" => Some(ColorBy::Auto),
                "D" => Some(ColorBy::Depth),
                "T" => Some(ColorBy::Time),
                "M" => Some(ColorBy::Mono),
                _ => None,
            })?,
            right_axis: parse_choice(params, "cntsAxis", RightAxis::Count, |v| match v {
                "N" => Some(RightAxis::None),
                "C" => Some(RightAxis::Count),
                "M" => Some(RightAxis::Magnitude),
                "T" => Some(RightAxis::Moment),
                _ => None,
            })?,
            rank_id: parse_rank_id(params)?,
            filters: Filters::parse(params)?,
            remark: params.get("rmk")?.map(str::to_string),
            display: DisplayFlags::parse(params)?,
            time,
            window,
            plot_type,
            bin,
        })
    }

    async fn get_data(
        &self,
        ctx: &PlotContext<'_>,
        inputs: &HypocenterInputs,
    ) -> PlotResult<HypocenterData> {
        let rank = common::resolve_rank(ctx, inputs.rank_id).await?;

        let mut query = common::query(ctx, Action::Data);
        inputs.time.add_to_query(&mut query);
        add_window_to_query(&inputs.window, &mut query);
        query.set("rk", inputs.rank_id);
        inputs.filters.add_to_query(&mut query);
        if let Some(remark) = &inputs.remark {
            query.set("rmk", remark);
        }

        let events = match common::fetch_binary(ctx, &query).await? {
            None => Vec::new(),
            Some(BinaryRecord::Hypocenters(events)) => events,
            Some(other) => return Err(common::unexpected_record("hypocenters", &other)),
        };
        Ok(HypocenterData { rank, events })
    }

    fn render(
        &self,
        panel: &PanelRequest,
        inputs: &HypocenterInputs,
        data: &HypocenterData,
    ) -> PlotResult<Rendering> {
        let (mut series, transform) = match inputs.plot_type {
            PlotType::Counts => {
                let counts = self.counts(inputs, data)?;
                let display = inputs.time.display_range();
                let mut series = counts.series()?;
                series.labels.left = Some(format!("Earthquakes per {}", inputs.bin.label()));
                if inputs.right_axis != RightAxis::None {
                    series.labels.right = Some(inputs.right_axis.label().to_string());
                }
                let y = series.y_axis.unwrap_or(AxisRange::new(0.0, 1.0));
                (series, coords::time_series(&panel.geometry, &display, y))
            }
            PlotType::Map => self.render_events(panel, inputs, data)?,
        };

        series.labels.top = Some(format!(
            "{} {} earthquake{} {}",
            data.events.len(),
            data.rank.name,
            if data.events.len() == 1 { "" } else { "s" },
            inputs.time.between_label()
        ));
        if inputs.display.legend {
            series.labels.legend.push(data.rank.name.clone());
        }

        Ok(Rendering {
            series,
            transform,
            display: inputs.display,
        })
    }

    fn export(&self, inputs: &HypocenterInputs, data: &HypocenterData) -> PlotResult<ExportTable> {
        match inputs.plot_type {
            PlotType::Counts => {
                let counts = self.counts(inputs, data)?;
                counts.export(
                    &format!("{}_EventsPer{}", data.rank.name, inputs.bin.label()),
                    &format!("{}_{}", data.rank.name, inputs.right_axis.column()),
                )
            }
            PlotType::Map => {
                let mut table = ExportTable::new(["Time", "Lat", "Lon", "Depth", "Magnitude"]);
                for e in &data.events {
                    table.push_row(vec![
                        format_timestamp(inputs.time.to_display(e.time)),
                        common::format_value(e.lat),
                        common::format_value(e.lon),
                        common::format_value(e.depth),
                        common::format_value(e.magnitude),
                    ])?;
                }
                Ok(table)
            }
        }
    }
}

impl HypocenterPlotter {
    fn counts(&self, inputs: &HypocenterInputs, data: &HypocenterData) -> PlotResult<BinnedCounts> {
        let mut events: Vec<&Hypocenter> = data.events.iter().collect();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        BinnedCounts::compute(
            &inputs.time.display_range(),
            inputs.bin,
            events
                .iter()
                .map(|e| (inputs.time.to_display(e.time), inputs.right_axis.weight(e))),
            inputs.right_axis != RightAxis::None,
        )
    }

    /// Plan view or cross-section of the events.
    fn render_events(
        &self,
        panel: &PanelRequest,
        inputs: &HypocenterInputs,
        data: &HypocenterData,
    ) -> PlotResult<(SeriesResult, plot_common::TransformVector)> {
        let events = &data.events;
        let depths: Vec<f64> = events.iter().map(|e| e.depth).collect();
        let times: Vec<f64> = events.iter().map(|e| inputs.time.to_display(e.time)).collect();
        let display = inputs.time.display_range();
        let depth_axis = AxisRange::of(&depths)
            .map(|r| AxisRange::new(r.min.min(0.0), r.max).padded(0.05))
            .unwrap_or(AxisRange::new(0.0, 10.0));
        let window = &inputs.window;

        let (mut series, transform) = match inputs.axes {
            Axes::Map => {
                let frame = MapFrame::fit(window, &panel.geometry)?;
                let (xs, ys) = project_points(&frame, events.iter().map(|e| (e.lon, e.lat)));
                let mut series = SeriesResult::new(SeriesKey::Position, xs);
                series.push_column("y", ys)?;
                series.push_column("depth", depths)?;
                (series, coords::map(&frame, Some(&display)))
            }
            Axes::LonDepth => {
                let lons = events.iter().map(|e| unwrap_longitude(window, e.lon)).collect();
                let x = AxisRange::new(window.west(), window.west() + window.lon_span());
                let mut series = SeriesResult::new(SeriesKey::Position, lons);
                series.push_column("depth", depths)?;
                series.labels.bottom = Some("Longitude".to_string());
                series.labels.left = Some("Depth (km)".to_string());
                let t = coords::value_plot(&panel.geometry, x, (depth_axis.max, depth_axis.min));
                (series, t)
            }
            Axes::LatDepth => {
                let lats = events.iter().map(|e| e.lat).collect();
                let x = AxisRange::new(window.south(), window.north());
                let mut series = SeriesResult::new(SeriesKey::Position, lats);
                series.push_column("depth", depths)?;
                series.labels.bottom = Some("Latitude".to_string());
                series.labels.left = Some("Depth (km)".to_string());
                let t = coords::value_plot(&panel.geometry, x, (depth_axis.max, depth_axis.min));
                (series, t)
            }
            Axes::TimeDepth => {
                let mut series = SeriesResult::new(SeriesKey::Time, times.clone());
                series.push_column("depth", depths)?;
                series.labels.left = Some("Depth (km)".to_string());
                (series, coords::time_depth(&panel.geometry, &display, depth_axis))
            }
        };

        series.push_column("magnitude", events.iter().map(|e| e.magnitude).collect())?;
        if inputs.axes != Axes::TimeDepth {
            series.push_column("time", times)?;
        }
        let color = match inputs.color {
            ColorBy::Auto if inputs.axes == Axes::TimeDepth => Some("Color by depth"),
            ColorBy::Auto | ColorBy::Time => Some("Color by time"),
            ColorBy::Depth => Some("Color by depth"),
            ColorBy::Mono => None,
        };
        if let Some(color) = color {
            series.labels.legend.push(color.to_string());
        }
        Ok((series, transform))
    }
}
