//! Render-ready series and export tables produced by the plot pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};
use crate::geo_window::GeoLabel;

/// What the shared key column of a series holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKey {
    /// J2K seconds, already shifted to the panel's time zone
    Time,
    /// A position or other non-time value
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range spanning finite `values`, or `None` when there are none.
    pub fn of(values: &[f64]) -> Option<Self> {
        let mut it = values.iter().copied().filter(|v| v.is_finite());
        let first = it.next()?;
        let (min, max) = it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Self { min, max })
    }

    /// Widen by `fraction` of the span on both ends. A zero span is
    /// widened by one unit so the axis stays drawable.
    pub fn padded(&self, fraction: f64) -> Self {
        let span = self.max - self.min;
        if span == 0.0 {
            return Self::new(self.min - 1.0, self.max + 1.0);
        }
        Self::new(self.min - span * fraction, self.max + span * fraction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Titles and legend text for one panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotLabels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub legend: Vec<String>,
}

/// Named numeric columns aligned on a shared key, plus labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResult {
    pub key: SeriesKey,
    pub keys: Vec<f64>,
    pub columns: Vec<SeriesColumn>,
    pub labels: PlotLabels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<AxisRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_axis: Option<AxisRange>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub annotations: Vec<GeoLabel>,
}

impl SeriesResult {
    pub fn new(key: SeriesKey, keys: Vec<f64>) -> Self {
        Self {
            key,
            keys,
            columns: Vec::new(),
            labels: PlotLabels::default(),
            y_axis: None,
            right_axis: None,
            annotations: Vec::new(),
        }
    }

    /// Append a column; it must be as long as the key column.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> PlotResult<()> {
        let name = name.into();
        if values.len() != self.keys.len() {
            return Err(PlotError::InternalError(format!(
                "column '{}' has {} values for {} keys",
                name,
                values.len(),
                self.keys.len()
            )));
        }
        self.columns.push(SeriesColumn { name, values });
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&SeriesColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Tabular rows for one panel, with stable column headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> PlotResult<()> {
        if row.len() != self.headers.len() {
            return Err(PlotError::ExportError(format!(
                "row has {} fields for {} headers",
                row.len(),
                self.headers.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_length_checked() {
        let mut s = SeriesResult::new(SeriesKey::Time, vec![0.0, 1.0]);
        assert!(s.push_column("count", vec![1.0, 2.0]).is_ok());
        assert!(s.push_column("bad", vec![1.0]).is_err());
        assert_eq!(s.column("count").unwrap().values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_axis_range() {
        let r = AxisRange::of(&[3.0, f64::NAN, -1.0, 2.0]).unwrap();
        assert_eq!((r.min, r.max), (-1.0, 3.0));
        assert!(AxisRange::of(&[]).is_none());
        let p = AxisRange::new(0.0, 10.0).padded(0.05);
        assert_eq!((p.min, p.max), (-0.5, 10.5));
        let flat = AxisRange::new(4.0, 4.0).padded(0.05);
        assert_eq!((flat.min, flat.max), (3.0, 5.0));
    }

    #[test]
    fn test_export_row_width() {
        let mut t = ExportTable::new(["Time", "Lat"]);
        assert!(t.push_row(vec!["0".into(), "1".into()]).is_ok());
        assert!(t.push_row(vec!["0".into()]).is_err());
        assert_eq!(t.len(), 1);
    }
}
