//! Lightning strokes: a map of strikes or stroke counts over time.

use async_trait::async_trait;
use backend::{Action, BinaryRecord, Stroke, VisualizationKind};
use plot_common::time::format_timestamp;
use plot_common::{
    AxisRange, ExportTable, GeoWindow, PanelRequest, ParamPolicy, ParamRule, PlotError, PlotResult,
    Rank, SeriesKey, SeriesResult, TimeBin,
};
use projection::MapFrame;

use super::common::{
    self, add_window_to_query, parse_choice, parse_rank_id, parse_window, project_points,
    BinnedCounts, DisplayFlags, TimeInputs,
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
    ("cntsBin", ParamRule::Optional),
    ("cntsAxis", ParamRule::Optional),
    ("minStationsDetected", ParamRule::Optional),
    ("maxStationsDetected", ParamRule::Optional),
    ("minResidual", ParamRule::Optional),
    ("maxResidual", ParamRule::Optional),
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotType {
    Map,
    Counts,
}

#[derive(Debug, Clone)]
pub struct LightningInputs {
    pub time: TimeInputs,
    pub window: GeoWindow,
    pub rank_id: u32,
    pub plot_type: PlotType,
    pub bin: TimeBin,
    /// Draw cumulative strokes on the right axis
    pub cumulative: bool,
    pub stations: (f64, f64),
    pub residual: (f64, f64),
    pub display: DisplayFlags,
}

#[derive(Debug, Clone)]
pub struct LightningData {
    pub rank: Rank,
    pub strokes: Vec<Stroke>,
}

pub struct LightningPlotter;

#[async_trait]
impl Plotter for LightningPlotter {
    type Inputs = LightningInputs;
    type Record = LightningData;

    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Lightning
    }

    fn policy(&self) -> ParamPolicy {
        POLICY
    }

    fn get_inputs(&self, panel: &PanelRequest, env: &PlotEnv) -> PlotResult<LightningInputs> {
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

        let unbounded = (f64::NEG_INFINITY, f64::INFINITY);
        Ok(LightningInputs {
            rank_id: parse_rank_id(params)?,
            cumulative: parse_choice(params, "cntsAxis", true, |v| match v {
                "N" => Some(false),
                "S" => Some(true),
                _ => None,
            })?,
            stations: params.range_f64(
                "minStationsDetected",
                "maxStationsDetected",
                "stations detected",
                unbounded,
            )?,
            residual: params.range_f64("minResidual", "maxResidual", "residual", unbounded)?,
            display: DisplayFlags::parse(params)?,
            time,
            window,
            plot_type,
            bin,
        })
    }

    async fn get_data(&self, ctx: &PlotContext<'_>, inputs: &LightningInputs) -> PlotResult<LightningData> {
        let rank = common::resolve_rank(ctx, inputs.rank_id).await?;

        let mut query = common::query(ctx, Action::Data);
        inputs.time.add_to_query(&mut query);
        add_window_to_query(&inputs.window, &mut query);
        query.set("rk", inputs.rank_id);
        for (key, v) in [
            ("minStationsDetected", inputs.stations.0),
            ("maxStationsDetected", inputs.stations.1),
            ("minResidual", inputs.residual.0),
            ("maxResidual", inputs.residual.1),
        ] {
            if v.is_finite() {
                query.set(key, v);
            }
        }

        let strokes = match common::fetch_binary(ctx, &query).await? {
            None => Vec::new(),
            Some(BinaryRecord::Strokes(strokes)) => strokes,
            Some(other) => return Err(common::unexpected_record("strokes", &other)),
        };
        Ok(LightningData { rank, strokes })
    }

    fn render(
        &self,
        panel: &PanelRequest,
        inputs: &LightningInputs,
        data: &LightningData,
    ) -> PlotResult<Rendering> {
        let display = inputs.time.display_range();
        let (mut series, transform) = match inputs.plot_type {
            PlotType::Counts => {
                let mut series = self.counts(inputs, data)?.series()?;
                series.labels.left = Some(format!("Strokes per {}", inputs.bin.label()));
                if inputs.cumulative {
                    series.labels.right = Some("Cumulative Strokes".to_string());
                }
                let y = series.y_axis.unwrap_or(AxisRange::new(0.0, 1.0));
                (series, coords::time_series(&panel.geometry, &display, y))
            }
            PlotType::Map => {
                let frame = MapFrame::fit(&inputs.window, &panel.geometry)?;
                let (xs, ys) = project_points(&frame, data.strokes.iter().map(|s| (s.lon, s.lat)));
                let mut series = SeriesResult::new(SeriesKey::Position, xs);
                series.push_column("y", ys)?;
                series.push_column(
                    "time",
                    data.strokes.iter().map(|s| inputs.time.to_display(s.time)).collect(),
                )?;
                series.push_column(
                    "stations",
                    data.strokes.iter().map(|s| f64::from(s.stations_detected)).collect(),
                )?;
                (series, coords::map(&frame, Some(&display)))
            }
        };

        let n = data.strokes.len();
        series.labels.top = Some(format!(
            "{} {} stroke{} {}",
            n,
            data.rank.name,
            if n == 1 { "" } else { "s" },
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

    fn export(&self, inputs: &LightningInputs, data: &LightningData) -> PlotResult<ExportTable> {
        match inputs.plot_type {
            PlotType::Counts => self.counts(inputs, data)?.export(
                &format!("{}_StrokesPer{}", data.rank.name, inputs.bin.label()),
                &format!("{}_CumulativeStrokes", data.rank.name),
            ),
            PlotType::Map => {
                let mut table =
                    ExportTable::new(["Time", "Lat", "Lon", "Stations Detected", "Residual"]);
                for s in &data.strokes {
                    table.push_row(vec![
                        format_timestamp(inputs.time.to_display(s.time)),
                        common::format_value(s.lat),
                        common::format_value(s.lon),
                        s.stations_detected.to_string(),
                        common::format_value(s.residual),
                    ])?;
                }
                Ok(table)
            }
        }
    }
}

impl LightningPlotter {
    fn counts(&self, inputs: &LightningInputs, data: &LightningData) -> PlotResult<BinnedCounts> {
        BinnedCounts::compute(
            &inputs.time.display_range(),
            inputs.bin,
            data.strokes
                .iter()
                .map(|s| (inputs.time.to_display(s.time), 1.0)),
            inputs.cumulative,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plot_common::{OutputMode, PanelGeometry, ParamBag, TimeZoneSpec, TransformKind};

    fn panel(params: ParamBag) -> PanelRequest {
        PanelRequest {
            index: 0,
            source: "strikes".into(),
            geometry: PanelGeometry::default(),
            params,
            mode: OutputMode::Render,
        }
    }

    fn base() -> ParamBag {
        ParamBag::new()
            .with("st", "0")
            .with("et", "7200")
            .with("west", "-156")
            .with("east", "-154")
            .with("south", "18")
            .with("north", "21")
    }

    fn env() -> PlotEnv {
        PlotEnv {
            default_tz: TimeZoneSpec::utc(),
            now: 0.0,
        }
    }

    fn data() -> LightningData {
        let strokes = match test_utils::strokes() {
            BinaryRecord::Strokes(s) => s,
            _ => unreachable!(),
        };
        LightningData {
            rank: Rank {
                id: 1,
                name: "WWLLN".into(),
                rank: 1,
                user_default: true,
            },
            strokes,
        }
    }

    #[test]
    fn test_map_is_default() {
        let p = panel(base());
        let inputs = LightningPlotter.get_inputs(&p, &env()).unwrap();
        assert_eq!(inputs.plot_type, PlotType::Map);
        assert!(inputs.cumulative);

        let r = LightningPlotter.render(&p, &inputs, &data()).unwrap();
        assert_eq!(r.transform.kind, TransformKind::Map);
        assert_eq!(r.transform.extent_min, 0.0);
        assert_eq!(r.transform.extent_max, 7_200.0);
        assert_eq!(r.series.len(), 2);
    }

    #[test]
    fn test_hourly_counts() {
        let p = panel(base().with("plotType", "cnts").with("cntsBin", "hour"));
        let inputs = LightningPlotter.get_inputs(&p, &env()).unwrap();
        let r = LightningPlotter.render(&p, &inputs, &data()).unwrap();
        assert_eq!(r.series.column("count").unwrap().values, vec![1.0, 1.0, 0.0]);
        assert_eq!(r.series.column("cumulative").unwrap().values, vec![1.0, 2.0, 2.0]);
        assert_eq!(r.series.labels.right.as_deref(), Some("Cumulative Strokes"));
    }

    #[test]
    fn test_counts_without_right_axis() {
        let p = panel(base().with("plotType", "cnts").with("cntsAxis", "N"));
        let inputs = LightningPlotter.get_inputs(&p, &env()).unwrap();
        let t = LightningPlotter.export(&inputs, &data()).unwrap();
        assert_eq!(t.headers, vec!["Time", "WWLLN_StrokesPerDay"]);
    }

    #[test]
    fn test_map_export() {
        let p = panel(base());
        let inputs = LightningPlotter.get_inputs(&p, &env()).unwrap();
        let t = LightningPlotter.export(&inputs, &data()).unwrap();
        assert_eq!(
            t.headers,
            vec!["Time", "Lat", "Lon", "Stations Detected", "Residual"]
        );
        assert_eq!(t.rows[0][3], "7");
        assert_eq!(t.rows[1][4], "9");
    }

    #[test]
    fn test_bad_axis_choice() {
        let p = panel(base().with("cntsAxis", "Q"));
        assert!(LightningPlotter.get_inputs(&p, &env()).is_err());
    }
}
