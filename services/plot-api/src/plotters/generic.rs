//! Generic time series: selected columns of a time-keyed table.

use async_trait::async_trait;
use backend::{Action, BinaryRecord, GenericSeries, VisualizationKind};
use plot_common::time::format_timestamp;
use plot_common::{
    AxisRange, ExportTable, PanelRequest, ParamPolicy, ParamRule, PlotError, PlotResult, SeriesKey,
    SeriesResult,
};

use super::common::{self, DisplayFlags, TimeInputs};
use super::{PlotContext, PlotEnv, Plotter, Rendering};
use crate::coords;

const POLICY: ParamPolicy = ParamPolicy::new(&[
    ("st", ParamRule::Required),
    ("et", ParamRule::Optional),
    ("tz", ParamRule::Optional),
    ("col", ParamRule::Optional),
]);

#[derive(Debug, Clone)]
pub struct GenericInputs {
    pub time: TimeInputs,
    /// Requested column names; all columns when `None`
    pub columns: Option<Vec<String>>,
    pub display: DisplayFlags,
}

/// The selected columns of a fetched series.
#[derive(Debug, Clone)]
pub struct GenericData {
    pub times: Vec<f64>,
    pub columns: Vec<(String, Vec<f64>)>,
}

pub struct GenericPlotter;

#[async_trait]
impl Plotter for GenericPlotter {
    type Inputs = GenericInputs;
    type Record = GenericData;

    fn kind(&self) -> VisualizationKind {
        VisualizationKind::Generic
    }

    fn policy(&self) -> ParamPolicy {
        POLICY
    }

    fn get_inputs(&self, panel: &PanelRequest, env: &PlotEnv) -> PlotResult<GenericInputs> {
        let params = &panel.params;
        let columns = params.get("col")?.map(|cols| {
            cols.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>()
        });
        if matches!(&columns, Some(c) if c.is_empty()) {
            return Err(PlotError::invalid("col", "no columns selected"));
        }
        Ok(GenericInputs {
            time: TimeInputs::parse(params, env)?,
            columns,
            display: DisplayFlags::parse(params)?,
        })
    }

    async fn get_data(&self, ctx: &PlotContext<'_>, inputs: &GenericInputs) -> PlotResult<GenericData> {
        let mut query = common::query(ctx, Action::Data);
        inputs.time.add_to_query(&mut query);
        if let Some(columns) = &inputs.columns {
            query.set("col", columns.join(","));
        }

        let series = match common::fetch_binary(ctx, &query).await? {
            None => GenericSeries::default(),
            Some(BinaryRecord::GenericSeries(series)) => series,
            Some(other) => return Err(common::unexpected_record("generic_series", &other)),
        };
        select_columns(series, inputs.columns.as_deref())
    }

    fn render(&self, panel: &PanelRequest, inputs: &GenericInputs, data: &GenericData) -> PlotResult<Rendering> {
        let display = inputs.time.display_range();
        let times = data.times.iter().map(|t| inputs.time.to_display(*t)).collect();
        let mut series = SeriesResult::new(SeriesKey::Time, times);
        for (name, values) in &data.columns {
            series.push_column(name.clone(), values.clone())?;
        }

        let all: Vec<f64> = data.columns.iter().flat_map(|(_, v)| v.iter().copied()).collect();
        let y = AxisRange::of(&all)
            .map(|r| r.padded(0.05))
            .unwrap_or(AxisRange::new(0.0, 1.0));
        series.y_axis = Some(y);
        series.labels.top = Some(inputs.time.between_label());
        if inputs.display.legend {
            series.labels.legend = data.columns.iter().map(|(name, _)| name.clone()).collect();
        }

        Ok(Rendering {
            transform: coords::time_series(&panel.geometry, &display, y),
            series,
            display: inputs.display,
        })
    }

    fn export(&self, inputs: &GenericInputs, data: &GenericData) -> PlotResult<ExportTable> {
        let mut table = ExportTable::new(
            std::iter::once("Time".to_string()).chain(data.columns.iter().map(|(n, _)| n.clone())),
        );
        for (i, t) in data.times.iter().enumerate() {
            let mut row = vec![format_timestamp(inputs.time.to_display(*t))];
            row.extend(data.columns.iter().map(|(_, v)| common::format_value(v[i])));
            table.push_row(row)?;
        }
        Ok(table)
    }
}

/// Pivot rows into the requested columns, in request order.
fn select_columns(series: GenericSeries, wanted: Option<&[String]>) -> PlotResult<GenericData> {
    let indices: Vec<usize> = match wanted {
        None => (0..series.columns.len()).collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                series
                    .columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| PlotError::invalid("col", format!("unknown column '{}'", name)))
            })
            .collect::<PlotResult<_>>()?,
    };

    if series.rows.len() != series.times.len() {
        return Err(PlotError::UnexpectedResponse(format!(
            "series has {} rows for {} times",
            series.rows.len(),
            series.times.len()
        )));
    }

    let mut columns: Vec<(String, Vec<f64>)> = indices
        .iter()
        .map(|&i| (series.columns[i].clone(), Vec::with_capacity(series.rows.len())))
        .collect();
    for row in &series.rows {
        for (slot, &i) in indices.iter().enumerate() {
            let v = row.get(i).copied().ok_or_else(|| {
                PlotError::UnexpectedResponse(format!("row has {} values, need column {}", row.len(), i))
            })?;
            columns[slot].1.push(v);
        }
    }

    Ok(GenericData {
        times: series.times,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series() -> GenericSeries {
        match test_utils::generic_series() {
            BinaryRecord::GenericSeries(s) => s,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_all_columns_by_default() {
        let data = select_columns(series(), None).unwrap();
        let names: Vec<&str> = data.columns.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["east", "north", "up"]);
        assert_eq!(data.columns[2].1, vec![3.0, 3.5, 4.0]);
    }

    #[test]
    fn test_selected_columns_in_request_order() {
        let wanted = vec!["up".to_string(), "east".to_string()];
        let data = select_columns(series(), Some(&wanted)).unwrap();
        assert_eq!(data.columns[0].0, "up");
        assert_eq!(data.columns[1].1, vec![1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_unknown_column() {
        let wanted = vec!["west".to_string()];
        let err = select_columns(series(), Some(&wanted)).unwrap_err();
        assert!(err.to_string().contains("unknown column 'west'"));
    }

    #[test]
    fn test_empty_series() {
        let data = select_columns(GenericSeries::default(), None).unwrap();
        assert!(data.times.is_empty());
        assert!(data.columns.is_empty());
    }
}
