//! Ratio of two channels' RSAM values, plotted directly or as counts of
//! threshold-crossing events.

use async_trait::async_trait;
use backend::{Action, BinaryRecord, RatioSeries, VisualizationKind};
use plot_common::time::format_timestamp;
use plot_common::{
    AxisRange, Channel, ExportTable, PanelRequest, ParamPolicy, ParamRule, PlotError, PlotResult,
    SeriesKey, SeriesResult, TimeBin,
};

use super::common::{self, parse_choice, BinnedCounts, DisplayFlags, TimeInputs};
use super::{PlotContext, PlotEnv, Plotter, Rendering};
use crate::coords;

const POLICY: ParamPolicy = ParamPolicy::new(&[
    ("st", ParamRule::Required),
    ("et", ParamRule::Optional),
    ("tz", ParamRule::Optional),
    ("ch", ParamRule::Required),
    ("plotType", ParamRule::Optional),
    ("rb", ParamRule::Optional),
    ("ysMin", ParamRule::Optional),
    ("ysMax", ParamRule::Optional),
    ("threshold", ParamRule::Optional),
    ("ratio", ParamRule::Optional),
    ("maxEventLength", ParamRule::Optional),
    ("cntsBin", ParamRule::Optional),
    ("cntsAxis", ParamRule::Optional),
]);

/// Padding applied to autoscaled ratio axes.
const AUTOSCALE_PADDING: f64 = 0.05;

/// Event detection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSettings {
    /// Ratio at or above which an event starts
    pub threshold: f64,
    /// An event ends when the ratio drops below `threshold * ratio`
    pub ratio: f64,
    /// Longest event kept, in seconds; zero keeps everything
    pub max_event_length: f64,
    pub bin: TimeBin,
    pub cumulative: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RatSamMode {
    Values,
    Counts(EventSettings),
}

#[derive(Debug, Clone)]
pub struct RatSamInputs {
    pub time: TimeInputs,
    pub channels: (u32, u32),
    pub mode: RatSamMode,
    pub remove_bias: bool,
    /// Fixed y range; autoscaled when absent
    pub y_scale: Option<AxisRange>,
    pub display: DisplayFlags,
}

#[derive(Debug, Clone)]
pub struct RatSamData {
    pub channels: (Channel, Channel),
    pub series: RatioSeries,
}

impl RatSamData {
    fn title(&self) -> String {
        format!("{}/{}", self.channels.0.code, self.channels.1.code)
    }
}

/// One detected excursion, in UTC J2K seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioEvent {
    pub start: f64,
    pub end: f64,
}

impl RatioEvent {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Find events in a ratio series.
///
/// An event opens at the first sample with `ratio >= threshold` and closes
/// at the first later sample below `threshold * ratio`. An event still
/// open at the end of the data closes at the last sample. Non-finite
/// samples are skipped.
pub fn detect_events(series: &RatioSeries, settings: &EventSettings) -> Vec<RatioEvent> {
    let close_below = settings.threshold * settings.ratio;
    let mut events = Vec::new();
    let mut open: Option<f64> = None;
    let mut last = None;

    for (&t, &r) in series.times.iter().zip(&series.ratios) {
        if !t.is_finite() || !r.is_finite() {
            continue;
        }
        last = Some(t);
        match open {
            None if r >= settings.threshold => open = Some(t),
            Some(start) if r < close_below => {
                events.push(RatioEvent { start, end: t });
                open = None;
            }
            _ => {}
        }
    }
    if let (Some(start), Some(end)) = (open, last) {
        events.push(RatioEvent { start, end });
    }

    if settings.max_event_length > 0.0 {
        events.retain(|e| e.length() <= settings.max_event_length);
    }
    events
}

pub struct RatSamPlotter;

#[async_trait]
impl Plotter for RatSamPlotter {
    type Inputs = RatSamInputs;
    type Record = RatSamData;

    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Ratsam
    }

    fn policy(&self) -> ParamPolicy {
        POLICY
    }

    fn get_inputs(&self, panel: &PanelRequest, env: &PlotEnv) -> PlotResult<RatSamInputs> {
        let params = &panel.params;
        let time = TimeInputs::parse(params, env)?;
        let channels = parse_channel_pair(params.require("ch")?)?;

        let y_scale = match (params.get_f64("ysMin")?, params.get_f64("ysMax")?) {
            (Some(min), Some(max)) if min < max => Some(AxisRange::new(min, max)),
            (Some(_), Some(_)) => {
                return Err(PlotError::invalid("ysMin", "Illegal y scale."));
            }
            (None, None) => None,
            _ => return Err(PlotError::invalid("ysMin", "ysMin and ysMax go together")),
        };

        let mode = match params.get_str_or("plotType", "values")? {
            "values" => RatSamMode::Values,
            "cnts" => {
                let threshold = params
                    .get_f64("threshold")?
                    .ok_or_else(|| PlotError::MissingParameter("threshold".to_string()))?;
                if threshold == 0.0 {
                    return Err(PlotError::invalid("threshold", "Illegal threshold."));
                }
                let ratio = params.get_f64_or("ratio", 1.0)?;
                if ratio == 0.0 {
                    return Err(PlotError::invalid("ratio", "Illegal ratio."));
                }
                let max_event_length = params.get_f64_or("maxEventLength", 0.0)?;
                if max_event_length < 0.0 {
                    return Err(PlotError::invalid("maxEventLength", "Illegal maxEventLength."));
                }
                let bin_name = params.get_str_or("cntsBin", "day")?;
                let bin = TimeBin::parse(bin_name).ok_or_else(|| {
                    PlotError::invalid("cntsBin", format!("unknown bin '{}'", bin_name))
                })?;
                bin.validate_range(&time.range)?;
                RatSamMode::Counts(EventSettings {
                    threshold,
                    ratio,
                    max_event_length,
                    bin,
                    cumulative: parse_choice(params, "cntsAxis", true, |v| match v {
                        "N" => Some(false),
                        "C" => Some(true),
                        _ => None,
                    })?,
                })
            }
            other => {
                return Err(PlotError::invalid("plotType", format!("unknown plot type '{}'", other)))
            }
        };

        Ok(RatSamInputs {
            remove_bias: params.get_bool_or("rb", false)?,
            display: DisplayFlags::parse(params)?,
            time,
            channels,
            mode,
            y_scale,
        })
    }

    async fn get_data(&self, ctx: &PlotContext<'_>, inputs: &RatSamInputs) -> PlotResult<RatSamData> {
        let known = common::channels(ctx).await?;
        let lookup = |cid: u32| {
            known
                .iter()
                .find(|c| c.cid == cid)
                .cloned()
                .ok_or_else(|| PlotError::invalid("ch", format!("unknown channel {}", cid)))
        };
        let channels = (lookup(inputs.channels.0)?, lookup(inputs.channels.1)?);

        let mut query = common::query(ctx, Action::RatData);
        inputs.time.add_to_query(&mut query);
        query.set("ch", format!("{},{}", inputs.channels.0, inputs.channels.1));

        let series = match common::fetch_binary(ctx, &query).await? {
            None => RatioSeries::default(),
            Some(BinaryRecord::RatioSeries(series)) => series,
            Some(other) => return Err(common::unexpected_record("ratio_series", &other)),
        };
        if series.times.len() != series.ratios.len() {
            return Err(PlotError::UnexpectedResponse(format!(
                "ratio series has {} times for {} ratios",
                series.times.len(),
                series.ratios.len()
            )));
        }
        Ok(RatSamData { channels, series })
    }

    fn render(&self, panel: &PanelRequest, inputs: &RatSamInputs, data: &RatSamData) -> PlotResult<Rendering> {
        let display = inputs.time.display_range();
        let (mut series, transform) = match &inputs.mode {
            RatSamMode::Values => {
                let ratios = self.ratios(inputs, data);
                let y = inputs
                    .y_scale
                    .or_else(|| AxisRange::of(&ratios).map(|r| r.padded(AUTOSCALE_PADDING)))
                    .unwrap_or(AxisRange::new(0.0, 1.0));
                let times = data.series.times.iter().map(|t| inputs.time.to_display(*t)).collect();
                let mut series = SeriesResult::new(SeriesKey::Time, times);
                series.push_column("ratio", ratios)?;
                series.y_axis = Some(y);
                series.labels.left = Some("RSAM ratio".to_string());
                (series, coords::time_series(&panel.geometry, &display, y))
            }
            RatSamMode::Counts(settings) => {
                let mut series = self.counts(inputs, data, settings)?.series()?;
                series.labels.left = Some(format!("Events per {}", settings.bin.label()));
                if settings.cumulative {
                    series.labels.right = Some("Cumulative Events".to_string());
                }
                let y = series.y_axis.unwrap_or(AxisRange::new(0.0, 1.0));
                (series, coords::time_series(&panel.geometry, &display, y))
            }
        };

        series.labels.top = Some(format!("{} {}", data.title(), inputs.time.between_label()));
        if inputs.display.legend {
            series.labels.legend.push(data.title());
        }
        Ok(Rendering {
            series,
            transform,
            display: inputs.display,
        })
    }

    fn export(&self, inputs: &RatSamInputs, data: &RatSamData) -> PlotResult<ExportTable> {
        match &inputs.mode {
            RatSamMode::Values => {
                let mut table = ExportTable::new(["Time".to_string(), data.title()]);
                for (t, r) in data.series.times.iter().zip(self.ratios(inputs, data)) {
                    table.push_row(vec![
                        format_timestamp(inputs.time.to_display(*t)),
                        common::format_value(r),
                    ])?;
                }
                Ok(table)
            }
            RatSamMode::Counts(settings) => self
                .counts(inputs, data, settings)?
                .export(&format!("EventsPer{}", settings.bin.label()), "CumulativeEvents"),
        }
    }
}

impl RatSamPlotter {
    /// Ratios with the mean removed when bias removal is on.
    fn ratios(&self, inputs: &RatSamInputs, data: &RatSamData) -> Vec<f64> {
        let ratios = &data.series.ratios;
        if !inputs.remove_bias {
            return ratios.clone();
        }
        let finite: Vec<f64> = ratios.iter().copied().filter(|r| r.is_finite()).collect();
        if finite.is_empty() {
            return ratios.clone();
        }
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        ratios.iter().map(|r| r - mean).collect()
    }

    fn counts(
        &self,
        inputs: &RatSamInputs,
        data: &RatSamData,
        settings: &EventSettings,
    ) -> PlotResult<BinnedCounts> {
        let events = detect_events(&data.series, settings);
        BinnedCounts::compute(
            &inputs.time.display_range(),
            settings.bin,
            events.iter().map(|e| (inputs.time.to_display(e.start), 1.0)),
            settings.cumulative,
        )
    }
}

/// Parse `ch` as two comma-separated channel ids.
fn parse_channel_pair(ch: &str) -> PlotResult<(u32, u32)> {
    let bad = || PlotError::invalid("ch", format!("'{}' is not a channel pair", ch));
    let (a, b) = ch.split_once(',').ok_or_else(bad)?;
    let a = a.trim().parse().map_err(|_| bad())?;
    let b = b.trim().parse().map_err(|_| bad())?;
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plot_common::{OutputMode, PanelGeometry, ParamBag, TimeZoneSpec};

    fn series() -> RatioSeries {
        match test_utils::ratio_series() {
            BinaryRecord::RatioSeries(s) => s,
            _ => unreachable!(),
        }
    }

    fn settings(max_event_length: f64) -> EventSettings {
        EventSettings {
            threshold: 2.0,
            ratio: 1.0,
            max_event_length,
            bin: TimeBin::Hour,
            cumulative: true,
        }
    }

    fn panel(params: ParamBag) -> PanelRequest {
        PanelRequest {
            index: 0,
            source: "rsam".into(),
            geometry: PanelGeometry::default(),
            params,
            mode: OutputMode::Render,
        }
    }

    fn env() -> PlotEnv {
        PlotEnv {
            default_tz: TimeZoneSpec::utc(),
            now: 0.0,
        }
    }

    fn data() -> RatSamData {
        let channels = Channel::parse_lines(&test_utils::channels::HAWAII).unwrap();
        RatSamData {
            channels: (channels[0].clone(), channels[2].clone()),
            series: series(),
        }
    }

    #[test]
    fn test_detect_events() {
        let events = detect_events(&series(), &settings(0.0));
        assert_eq!(
            events,
            vec![
                RatioEvent { start: 60.0, end: 180.0 },
                RatioEvent { start: 300.0, end: 360.0 },
            ]
        );
    }

    #[test]
    fn test_max_event_length() {
        let events = detect_events(&series(), &settings(100.0));
        assert_eq!(events, vec![RatioEvent { start: 300.0, end: 360.0 }]);
    }

    #[test]
    fn test_hysteresis() {
        // Closing below 2 * 0.5 = 1 keeps the first event open through 1.0.
        let s = RatioSeries {
            times: vec![0.0, 60.0, 120.0, 180.0],
            ratios: vec![2.5, 1.0, 0.5, 3.0],
        };
        let mut cfg = settings(0.0);
        cfg.ratio = 0.5;
        let events = detect_events(&s, &cfg);
        assert_eq!(events[0], RatioEvent { start: 0.0, end: 120.0 });
        // Open at the end of data closes at the last sample.
        assert_eq!(events[1], RatioEvent { start: 180.0, end: 180.0 });
    }

    #[test]
    fn test_counts_require_threshold() {
        let params = ParamBag::new().with("st", "0").with("et", "3600").with("ch", "1,3");
        let p = panel(params.clone().with("plotType", "cnts"));
        assert!(matches!(
            RatSamPlotter.get_inputs(&p, &env()),
            Err(PlotError::MissingParameter(_))
        ));
        let p = panel(params.clone().with("plotType", "cnts").with("threshold", "0"));
        assert!(RatSamPlotter.get_inputs(&p, &env()).is_err());
        let p = panel(params.with("plotType", "cnts").with("threshold", "2").with("ratio", "0"));
        assert!(RatSamPlotter.get_inputs(&p, &env()).is_err());
    }

    #[test]
    fn test_channel_pair() {
        assert_eq!(parse_channel_pair("1, 3").unwrap(), (1, 3));
        assert!(parse_channel_pair("1").is_err());
        assert!(parse_channel_pair("1,x").is_err());
    }

    #[test]
    fn test_values_with_bias_removed() {
        let params = ParamBag::new()
            .with("st", "0")
            .with("et", "3600")
            .with("ch", "1,3")
            .with("rb", "T");
        let p = panel(params);
        let inputs = RatSamPlotter.get_inputs(&p, &env()).unwrap();
        let r = RatSamPlotter.render(&p, &inputs, &data()).unwrap();
        let ratios = &r.series.column("ratio").unwrap().values;
        let sum: f64 = ratios.iter().sum();
        assert!(sum.abs() < 1e-9);
        assert_eq!(
            r.series.labels.top.as_deref(),
            Some("KIPU EHZ HV/MLOD EHZ HV between 2000-01-01 and 2000-01-01 (UTC)")
        );
    }

    #[test]
    fn test_fixed_scale() {
        let params = ParamBag::new()
            .with("st", "0")
            .with("et", "3600")
            .with("ch", "1,3")
            .with("ysMin", "0")
            .with("ysMax", "5");
        let p = panel(params);
        let inputs = RatSamPlotter.get_inputs(&p, &env()).unwrap();
        assert_eq!(inputs.y_scale, Some(AxisRange::new(0.0, 5.0)));
        let r = RatSamPlotter.render(&p, &inputs, &data()).unwrap();
        assert_eq!(r.series.y_axis, Some(AxisRange::new(0.0, 5.0)));
    }

    #[test]
    fn test_counts_export() {
        let params = ParamBag::new()
            .with("st", "0")
            .with("et", "3600")
            .with("ch", "1,3")
            .with("plotType", "cnts")
            .with("threshold", "2")
            .with("cntsBin", "hour");
        let p = panel(params);
        let inputs = RatSamPlotter.get_inputs(&p, &env()).unwrap();
        let t = RatSamPlotter.export(&inputs, &data()).unwrap();
        assert_eq!(t.headers, vec!["Time", "EventsPerHour", "CumulativeEvents"]);
        assert_eq!(t.rows[0][1], "2");
    }
}
