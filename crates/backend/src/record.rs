//! Decoded records returned by binary queries.
//!
//! Times are J2K seconds in UTC.

use serde::{Deserialize, Serialize};

/// One decoded binary query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BinaryRecord {
    Hypocenters(Vec<Hypocenter>),
    Strokes(Vec<Stroke>),
    RatioSeries(RatioSeries),
    GenericSeries(GenericSeries),
}

impl BinaryRecord {
    pub fn type_name(&self) -> &'static str {
        match self {
            BinaryRecord::Hypocenters(_) => "hypocenters",
            BinaryRecord::Strokes(_) => "strokes",
            BinaryRecord::RatioSeries(_) => "ratio_series",
            BinaryRecord::GenericSeries(_) => "generic_series",
        }
    }
}

/// An earthquake location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypocenter {
    pub time: f64,
    pub lon: f64,
    pub lat: f64,
    /// Kilometers below sea level
    pub depth: f64,
    pub magnitude: f64,
    #[serde(default)]
    pub nphases: Option<u32>,
    #[serde(default)]
    pub rms: Option<f64>,
    /// Horizontal error (km)
    #[serde(default)]
    pub herr: Option<f64>,
    /// Vertical error (km)
    #[serde(default)]
    pub verr: Option<f64>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// A located lightning stroke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub time: f64,
    pub lon: f64,
    pub lat: f64,
    pub stations_detected: u32,
    pub residual: f64,
}

/// Ratio of two channels' RSAM values over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatioSeries {
    pub times: Vec<f64>,
    pub ratios: Vec<f64>,
}

/// Time-keyed rows of named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenericSeries {
    /// Column names, excluding time
    pub columns: Vec<String>,
    pub times: Vec<f64>,
    /// One row per time, one value per column
    pub rows: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json() {
        let json = r#"{"type":"hypocenters","data":[
            {"time":100.0,"lon":-155.3,"lat":19.4,"depth":5.0,"magnitude":2.1}
        ]}"#;
        let rec: BinaryRecord = serde_json::from_str(json).unwrap();
        match rec {
            BinaryRecord::Hypocenters(h) => {
                assert_eq!(h.len(), 1);
                assert_eq!(h[0].nphases, None);
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_ratio_series_json() {
        let json = r#"{"type":"ratio_series","data":{"times":[0.0,60.0],"ratios":[1.0,2.5]}}"#;
        let rec: BinaryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.type_name(), "ratio_series");
    }
}
