//! Common test fixtures for geoplot tests.
//!
//! This module provides canned backend responses and registries that
//! represent common scenarios in event and time-series plotting.

use std::path::PathBuf;

use backend::{
    BinaryRecord, DataSourceDescriptor, DataSourceRegistry, ExhaustionPolicy, GenericSeries,
    Hypocenter, RatioSeries, Stroke, VisualizationKind,
};
use tempfile::TempDir;

use crate::mock::MockBackend;

/// Rank lines as returned by the `ranks` action.
pub mod ranks {
    /// Automatic (1) and reviewed (2) solutions; reviewed is best.
    pub const STANDARD: [&str; 2] = ["1:Automatic:1:1", "2:Reviewed:2:0"];

    /// A single rank.
    pub const SINGLE: [&str; 1] = ["1:Automatic:1:1"];
}

/// Channel lines as returned by the `channels` action.
pub mod channels {
    pub const HAWAII: [&str; 4] = [
        "1:KIPU EHZ HV:Kipuka:-155.3:19.4:1000",
        "2:KIPU HHE HV:Kipuka east:-155.3:19.4:1000",
        "3:MLOD EHZ HV:Mauna Loa:-155.6:19.5",
        "4:HNL EHZ HV:Honolulu:-157.9:21.3",
    ];
}

/// Geographic windows as (west, east, south, north).
pub mod windows {
    pub const WORLD: (f64, f64, f64, f64) = (-180.0, 180.0, -90.0, 90.0);

    /// Island of Hawaii
    pub const HAWAII: (f64, f64, f64, f64) = (-156.2, -154.7, 18.8, 20.4);

    /// Crosses the antimeridian
    pub const ALEUTIANS: (f64, f64, f64, f64) = (170.0, -160.0, 50.0, 56.0);
}

pub fn hypocenter(time: f64, lon: f64, lat: f64, depth: f64, magnitude: f64) -> Hypocenter {
    Hypocenter {
        time,
        lon,
        lat,
        depth,
        magnitude,
        nphases: Some(12),
        rms: Some(0.1),
        herr: Some(0.5),
        verr: Some(0.8),
        remark: None,
    }
}

/// Three events at 100 s, 3700 s and 90000 s.
pub fn three_hypocenters() -> BinaryRecord {
    BinaryRecord::Hypocenters(vec![
        hypocenter(100.0, -155.3, 19.4, 5.0, 2.0),
        hypocenter(3_700.0, -155.2, 19.3, 8.0, 3.0),
        hypocenter(90_000.0, -155.6, 19.5, 30.0, 4.0),
    ])
}

pub fn strokes() -> BinaryRecord {
    BinaryRecord::Strokes(vec![
        Stroke {
            time: 10.0,
            lon: -155.3,
            lat: 19.4,
            stations_detected: 7,
            residual: 4.5,
        },
        Stroke {
            time: 4_000.0,
            lon: -155.0,
            lat: 19.6,
            stations_detected: 5,
            residual: 9.0,
        },
    ])
}

/// Ratio series sampled once a minute with two excursions above 2.0.
pub fn ratio_series() -> BinaryRecord {
    let ratios = vec![1.0, 2.5, 2.6, 1.0, 1.0, 3.0, 1.2, 1.0];
    let times = (0..ratios.len()).map(|i| i as f64 * 60.0).collect();
    BinaryRecord::RatioSeries(RatioSeries { times, ratios })
}

pub fn generic_series() -> BinaryRecord {
    BinaryRecord::GenericSeries(GenericSeries {
        columns: vec!["east".into(), "north".into(), "up".into()],
        times: vec![0.0, 60.0, 120.0],
        rows: vec![
            vec![1.0, 2.0, 3.0],
            vec![1.5, 2.5, 3.5],
            vec![2.0, 3.0, 4.0],
        ],
    })
}

/// A registry with one pool backed by `mock`, serving `source` with `kind`.
pub fn registry_with(mock: &MockBackend, source: &str, kind: VisualizationKind) -> DataSourceRegistry {
    DataSourceRegistry::builder()
        .pool(mock.pool(2, ExhaustionPolicy::FailFast))
        .source(DataSourceDescriptor::new(
            source,
            mock.name(),
            format!("{}_remote", source),
            kind,
        ))
        .build()
}

/// Write `contents` to a file inside a fresh temporary directory.
///
/// Keep the returned `TempDir` alive for as long as the file is needed.
pub fn write_temp_file(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("write temp file");
    (dir, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plot_common::Rank;

    #[test]
    fn test_rank_fixtures_parse() {
        let parsed = Rank::parse_lines(&ranks::STANDARD).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_registry_with() {
        let mock = MockBackend::new("hvo");
        let registry = registry_with(&mock, "quakes", VisualizationKind::Hypocenter);
        let d = registry.descriptor("quakes").unwrap();
        assert_eq!(d.backend, "hvo");
        assert_eq!(d.remote_source, "quakes_remote");
        assert!(registry.pool("hvo").is_ok());
    }

    #[test]
    fn test_write_temp_file() {
        let (_dir, path) = write_temp_file("a.yaml", "x: 1");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x: 1");
    }
}
