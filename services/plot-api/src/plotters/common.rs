//! Parameter parsing and backend access shared by the plotters.

use std::sync::Arc;

use backend::{Action, BinaryRecord, QueryParams};
use plot_common::binning::cumulative_axis;
use plot_common::time::{format_date, format_timestamp};
use plot_common::{
    AxisRange, Channel, ExportTable, GeoWindow, Histogram, ParamBag, PlotError, PlotResult, Rank,
    SeriesKey, SeriesResult, TimeBin, TimeRange, TimeZoneSpec,
};
use projection::MapFrame;
use serde::Serialize;
use tracing::debug;

use super::{PlotContext, PlotEnv};

/// The requested time range and the zone it is displayed in.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeInputs {
    /// UTC J2K seconds, as sent to the backend
    pub range: TimeRange,
    pub tz: TimeZoneSpec,
}

impl TimeInputs {
    /// Parse `st` (required), `et` and `tz`.
    pub fn parse(params: &ParamBag, env: &PlotEnv) -> PlotResult<Self> {
        let tz = match params.get("tz")? {
            Some(s) => TimeZoneSpec::parse(s)?,
            None => env.default_tz.clone(),
        };
        let st = params.require("st")?;
        let range = TimeRange::parse(st, params.get("et")?, &tz, env.now)?;
        Ok(Self { range, tz })
    }

    /// The range in display time.
    pub fn display_range(&self) -> TimeRange {
        self.range.shifted(self.tz.offset_seconds)
    }

    /// Shift a UTC record time into display time.
    pub fn to_display(&self, t: f64) -> f64 {
        t + self.tz.offset_seconds
    }

    /// `between yyyy-MM-dd and yyyy-MM-dd (zone)` in display time.
    pub fn between_label(&self) -> String {
        let display = self.display_range();
        format!(
            "between {} and {} ({})",
            format_date(display.start),
            format_date(display.end),
            self.tz.name
        )
    }

    pub fn add_to_query(&self, query: &mut QueryParams) {
        query.set("st", self.range.start);
        query.set("et", self.range.end);
    }
}

/// Parse the required `west`, `east`, `south`, `north` keys.
pub fn parse_window(params: &ParamBag) -> PlotResult<GeoWindow> {
    let edge = |key: &str| -> PlotResult<f64> {
        params
            .get_f64(key)?
            .ok_or_else(|| PlotError::MissingParameter(key.to_string()))
    };
    Ok(GeoWindow::new(edge("west")?, edge("east")?, edge("south")?, edge("north")?)?)
}

pub fn add_window_to_query(window: &GeoWindow, query: &mut QueryParams) {
    query.set("west", window.west());
    query.set("east", window.east());
    query.set("south", window.south());
    query.set("north", window.north());
}

/// Axis decorations the renderer should draw. Every flag defaults to on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayFlags {
    pub x_tick_marks: bool,
    pub x_tick_values: bool,
    pub x_units: bool,
    pub x_label: bool,
    pub y_tick_marks: bool,
    pub y_tick_values: bool,
    pub y_units: bool,
    pub y_label: bool,
    pub legend: bool,
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self {
            x_tick_marks: true,
            x_tick_values: true,
            x_units: true,
            x_label: true,
            y_tick_marks: true,
            y_tick_values: true,
            y_units: true,
            y_label: true,
            legend: true,
        }
    }
}

impl DisplayFlags {
    pub fn parse(params: &ParamBag) -> PlotResult<Self> {
        Ok(Self {
            x_tick_marks: params.get_bool_or("xTickMarks", true)?,
            x_tick_values: params.get_bool_or("xTickValues", true)?,
            x_units: params.get_bool_or("xUnits", true)?,
            x_label: params.get_bool_or("xLabel", true)?,
            y_tick_marks: params.get_bool_or("yTickMarks", true)?,
            y_tick_values: params.get_bool_or("yTickValues", true)?,
            y_units: params.get_bool_or("yUnits", true)?,
            y_label: params.get_bool_or("yLabel", true)?,
            legend: params.get_bool_or("lg", true)?,
        })
    }
}

/// Parse an optional single-letter choice, case-insensitive.
pub fn parse_choice<T>(
    params: &ParamBag,
    key: &str,
    default: T,
    choose: impl Fn(&str) -> Option<T>,
) -> PlotResult<T> {
    match params.get(key)? {
        None => Ok(default),
        Some(v) => choose(&v.trim().to_ascii_uppercase())
            .ok_or_else(|| PlotError::invalid(key, format!("unknown value '{}'", v))),
    }
}

/// Parse a non-negative rank id from `rk`, defaulting to best available.
pub fn parse_rank_id(params: &ParamBag) -> PlotResult<u32> {
    let rk = params.get_i64_or("rk", i64::from(plot_common::rank::BEST_AVAILABLE))?;
    u32::try_from(rk).map_err(|_| PlotError::invalid("rk", format!("'{}' is not a rank id", rk)))
}

/// A query for the descriptor's remote source.
pub fn query(ctx: &PlotContext<'_>, action: Action) -> QueryParams {
    QueryParams::new(&ctx.descriptor.remote_source, action)
}

/// Issue one text query. The connection is back in the pool before
/// this returns.
pub async fn fetch_text(ctx: &PlotContext<'_>, params: &QueryParams) -> PlotResult<Vec<String>> {
    let lines = {
        let conn = ctx.registry.acquire(&ctx.descriptor.backend).await?;
        let lines = conn.text_query(params).await;
        lines
    }?;
    debug!(
        source = %ctx.descriptor.name,
        action = params.action(),
        lines = lines.len(),
        "Text query complete"
    );
    Ok(lines)
}

/// Issue one binary query. `None` means the backend had no data.
pub async fn fetch_binary(
    ctx: &PlotContext<'_>,
    params: &QueryParams,
) -> PlotResult<Option<BinaryRecord>> {
    let record = {
        let conn = ctx.registry.acquire(&ctx.descriptor.backend).await?;
        let record = conn.binary_query(params).await;
        record
    }?;
    debug!(
        source = %ctx.descriptor.name,
        action = params.action(),
        record = record.as_ref().map_or("none", BinaryRecord::type_name),
        "Binary query complete"
    );
    Ok(record)
}

/// Error for a record of the wrong shape.
pub fn unexpected_record(expected: &str, got: &BinaryRecord) -> PlotError {
    PlotError::UnexpectedResponse(format!(
        "expected {} record, got {}",
        expected,
        got.type_name()
    ))
}

/// Ranks offered by the source, through the rank cache.
pub async fn ranks(ctx: &PlotContext<'_>) -> PlotResult<Arc<Vec<Rank>>> {
    ctx.caches
        .ranks
        .get_or_fetch(&ctx.descriptor.name, || async {
            let lines = fetch_text(ctx, &query(ctx, Action::Ranks)).await?;
            Rank::parse_lines(&lines)
        })
        .await
}

/// Resolve a requested rank id against the source's ranks.
pub async fn resolve_rank(ctx: &PlotContext<'_>, requested: u32) -> PlotResult<Rank> {
    let available = ranks(ctx).await?;
    plot_common::resolve_rank(requested, &available)
}

/// Channels served by the source, through the channel cache.
pub async fn channels(ctx: &PlotContext<'_>) -> PlotResult<Arc<Vec<Channel>>> {
    ctx.caches
        .channels
        .get_or_fetch(&ctx.descriptor.name, || async {
            let lines = fetch_text(ctx, &query(ctx, Action::Channels)).await?;
            Channel::parse_lines(&lines)
        })
        .await
}

/// Format a number for export without trailing noise.
pub fn format_value(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Per-bucket event counts plus an optional running sum of a per-event
/// weight, in display time.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedCounts {
    pub bin: TimeBin,
    pub starts: Vec<f64>,
    pub counts: Vec<f64>,
    pub cumulative: Option<Vec<f64>>,
}

impl BinnedCounts {
    /// Bin `(time, weight)` pairs over `range`. Events outside the range
    /// are dropped.
    pub fn compute(
        range: &TimeRange,
        bin: TimeBin,
        events: impl IntoIterator<Item = (f64, f64)>,
        with_cumulative: bool,
    ) -> PlotResult<Self> {
        let mut counts = Histogram::new(range, bin)?;
        let mut weights = Histogram::new(range, bin)?;
        for (t, w) in events {
            if counts.add(t, 1.0) {
                weights.add(t, w);
            }
        }
        Ok(Self {
            bin,
            starts: counts.bucket_starts(),
            counts: counts.values().to_vec(),
            cumulative: with_cumulative.then(|| weights.cumulative()),
        })
    }

    pub fn total(&self) -> f64 {
        self.counts.iter().sum()
    }

    /// Time-keyed series with a `count` column and, when present, a
    /// `cumulative` column on the right axis.
    pub fn series(&self) -> PlotResult<SeriesResult> {
        let mut series = SeriesResult::new(SeriesKey::Time, self.starts.clone());
        series.push_column("count", self.counts.clone())?;
        let peak = self.counts.iter().copied().fold(0.0, f64::max);
        series.y_axis = Some(AxisRange::new(0.0, peak.max(1.0)));
        if let Some(cum) = &self.cumulative {
            series.push_column("cumulative", cum.clone())?;
            series.right_axis = cumulative_axis(cum);
        }
        Ok(series)
    }

    /// One row per bucket: start time, count and the cumulative value.
    pub fn export(&self, count_header: &str, cumulative_header: &str) -> PlotResult<ExportTable> {
        let mut headers = vec!["Time".to_string(), count_header.to_string()];
        if self.cumulative.is_some() {
            headers.push(cumulative_header.to_string());
        }
        let mut table = ExportTable::new(headers);
        for (i, start) in self.starts.iter().enumerate() {
            let mut row = vec![format_timestamp(*start), format_value(self.counts[i])];
            if let Some(cum) = &self.cumulative {
                row.push(format_value(cum[i]));
            }
            table.push_row(row)?;
        }
        Ok(table)
    }
}

/// Longitude on the window's continuous axis, so a window crossing the
/// antimeridian gets increasing values from west to east.
pub fn unwrap_longitude(window: &GeoWindow, lon: f64) -> f64 {
    window.west() + (lon - window.west()).rem_euclid(360.0)
}

/// Project points into the frame, returning (xs, ys) in meters.
pub fn project_points(
    frame: &MapFrame,
    points: impl IntoIterator<Item = (f64, f64)>,
) -> (Vec<f64>, Vec<f64>) {
    points.into_iter().map(|(lon, lat)| frame.project(lon, lat)).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> PlotEnv {
        PlotEnv {
            default_tz: TimeZoneSpec::utc(),
            now: 1_000_000.0,
        }
    }

    #[test]
    fn test_time_inputs_defaults() {
        let params = ParamBag::new().with("st", "-1d");
        let t = TimeInputs::parse(&params, &env()).unwrap();
        assert_eq!(t.range.end, 1_000_000.0);
        assert_eq!(t.range.start, 1_000_000.0 - 86_400.0);
        assert_eq!(t.tz, TimeZoneSpec::utc());
    }

    #[test]
    fn test_time_inputs_require_st() {
        let err = TimeInputs::parse(&ParamBag::new(), &env()).unwrap_err();
        assert!(matches!(err, PlotError::MissingParameter(ref k) if k == "st"));
    }

    #[test]
    fn test_display_shift() {
        let params = ParamBag::new().with("st", "0").with("et", "86400").with("tz", "-10");
        let t = TimeInputs::parse(&params, &env()).unwrap();
        assert_eq!(t.display_range().start, -36_000.0);
        assert_eq!(t.to_display(36_000.0), 0.0);
        assert!(t.between_label().ends_with("(UTC-10:00)"));
    }

    #[test]
    fn test_window_requires_all_edges() {
        let params = ParamBag::new().with("west", "-156").with("east", "-154");
        assert!(matches!(parse_window(&params), Err(PlotError::MissingParameter(_))));

        let params = params.with("south", "20").with("north", "19");
        assert!(matches!(parse_window(&params), Err(PlotError::InvalidArea(_))));
    }

    #[test]
    fn test_display_flags() {
        let flags = DisplayFlags::parse(&ParamBag::new().with("lg", "F").with("xUnits", "0")).unwrap();
        assert!(!flags.legend);
        assert!(!flags.x_units);
        assert!(flags.y_label);
        assert!(DisplayFlags::parse(&ParamBag::new().with("lg", "maybe")).is_err());
    }

    #[test]
    fn test_rank_id() {
        assert_eq!(parse_rank_id(&ParamBag::new()).unwrap(), 0);
        assert_eq!(parse_rank_id(&ParamBag::new().with("rk", "2")).unwrap(), 2);
        assert!(parse_rank_id(&ParamBag::new().with("rk", "-1")).is_err());
    }

    #[test]
    fn test_binned_counts() {
        let range = TimeRange::new(0.0, 86_400.0).unwrap();
        let events = [(100.0, 2.0), (3_700.0, 3.0), (90_000.0, 4.0), (-5.0, 9.0)];
        let counts = BinnedCounts::compute(&range, TimeBin::Day, events, true).unwrap();
        assert_eq!(counts.counts, vec![2.0, 1.0]);
        assert_eq!(counts.cumulative, Some(vec![5.0, 9.0]));
        assert_eq!(counts.total(), 3.0);

        let series = counts.series().unwrap();
        assert_eq!(series.right_axis, Some(AxisRange::new(5.0, 9.0)));

        let table = counts.export("EventsPerDay", "Cumulative").unwrap();
        assert_eq!(table.headers, vec!["Time", "EventsPerDay", "Cumulative"]);
        assert_eq!(table.rows[0], vec!["2000-01-01 12:00:00.000", "2", "5"]);
    }

    #[test]
    fn test_unwrap_longitude() {
        let window = GeoWindow::new(170.0, -160.0, 50.0, 56.0).unwrap();
        assert_eq!(unwrap_longitude(&window, 175.0), 175.0);
        assert_eq!(unwrap_longitude(&window, -170.0), 190.0);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(-155.3), "-155.3");
    }
}
