//! Time binning and cumulative aggregation for event-count plots.

use serde::{Deserialize, Serialize};

use crate::error::{PlotError, PlotResult};
use crate::series::AxisRange;
use crate::time::TimeRange;

/// Upper bound on the number of buckets a single histogram may have.
pub const MAX_BUCKETS: u64 = 10_000;

/// Fixed bucket durations for event-count histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBin {
    Second,
    Minute,
    TenMinute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeBin {
    /// Parse a bin name as sent by clients (`hour`, `day`, ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sec" | "second" => Some(TimeBin::Second),
            "min" | "minute" => Some(TimeBin::Minute),
            "tenmin" | "tenminute" => Some(TimeBin::TenMinute),
            "hour" => Some(TimeBin::Hour),
            "day" => Some(TimeBin::Day),
            "week" => Some(TimeBin::Week),
            "month" => Some(TimeBin::Month),
            "year" => Some(TimeBin::Year),
            _ => None,
        }
    }

    /// Bucket width in seconds. Months are 30 days and years 365.
    pub fn seconds(&self) -> f64 {
        match self {
            TimeBin::Second => 1.0,
            TimeBin::Minute => 60.0,
            TimeBin::TenMinute => 600.0,
            TimeBin::Hour => 3_600.0,
            TimeBin::Day => 86_400.0,
            TimeBin::Week => 604_800.0,
            TimeBin::Month => 2_592_000.0,
            TimeBin::Year => 31_536_000.0,
        }
    }

    /// Human label used in axis titles, e.g. "Day".
    pub fn label(&self) -> &'static str {
        match self {
            TimeBin::Second => "Second",
            TimeBin::Minute => "Minute",
            TimeBin::TenMinute => "TenMinute",
            TimeBin::Hour => "Hour",
            TimeBin::Day => "Day",
            TimeBin::Week => "Week",
            TimeBin::Month => "Month",
            TimeBin::Year => "Year",
        }
    }

    /// Reject ranges that would need more than [`MAX_BUCKETS`] buckets.
    pub fn validate_range(&self, range: &TimeRange) -> PlotResult<()> {
        let buckets = range.duration() / self.seconds();
        if buckets > MAX_BUCKETS as f64 {
            return Err(PlotError::TooManyBuckets {
                buckets: buckets.ceil() as u64,
                limit: MAX_BUCKETS,
            });
        }
        Ok(())
    }
}

/// Fixed-width, left-closed buckets starting at the range start.
///
/// There are `floor(duration / width) + 1` buckets so that the end instant
/// falls inside the last one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    start: f64,
    width: f64,
    values: Vec<f64>,
}

impl Histogram {
    /// Create an all-zero histogram over `range`.
    pub fn new(range: &TimeRange, bin: TimeBin) -> PlotResult<Self> {
        bin.validate_range(range)?;
        let width = bin.seconds();
        let count = (range.duration() / width).floor() as usize + 1;
        Ok(Self {
            start: range.start,
            width,
            values: vec![0.0; count],
        })
    }

    /// Index of the bucket containing `t`, if any.
    pub fn bucket_index(&self, t: f64) -> Option<usize> {
        if !t.is_finite() || t < self.start {
            return None;
        }
        let idx = ((t - self.start) / self.width).floor() as usize;
        (idx < self.values.len()).then_some(idx)
    }

    /// Add `weight` to the bucket containing `t`. Returns false when `t`
    /// falls outside every bucket.
    pub fn add(&mut self, t: f64, weight: f64) -> bool {
        match self.bucket_index(t) {
            Some(idx) => {
                self.values[idx] += weight;
                true
            }
            None => false,
        }
    }

    /// Count one per timestamp.
    pub fn from_times(range: &TimeRange, bin: TimeBin, times: impl IntoIterator<Item = f64>) -> PlotResult<Self> {
        let mut hist = Self::new(range, bin)?;
        for t in times {
            hist.add(t, 1.0);
        }
        Ok(hist)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Start time of each bucket.
    pub fn bucket_starts(&self) -> Vec<f64> {
        (0..self.values.len())
            .map(|i| self.start + i as f64 * self.width)
            .collect()
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Running sum over the buckets.
    pub fn cumulative(&self) -> Vec<f64> {
        cumulative(&self.values)
    }
}

/// Running sum of `values`.
pub fn cumulative(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(0.0, |acc, v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

/// Right-axis range of a cumulative series: its first and last values.
pub fn cumulative_axis(series: &[f64]) -> Option<AxisRange> {
    let first = *series.first()?;
    let last = *series.last()?;
    Some(AxisRange::new(first.min(last), first.max(last)))
}

/// Seismic moment in N·m for a magnitude.
pub fn moment(magnitude: f64) -> f64 {
    10f64.powf(1.5 * magnitude + 9.1)
}
