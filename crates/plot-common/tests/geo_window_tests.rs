//! Tests for GeoWindow operations.

use plot_common::geo_window::{normalize_longitude, GeoLabel, GeoWindow, GeoWindowError};

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_window_new() {
    let w = GeoWindow::new(-160.0, -154.0, 18.0, 23.0).unwrap();
    assert_eq!(w.west(), -160.0);
    assert_eq!(w.east(), -154.0);
    assert_eq!(w.south(), 18.0);
    assert_eq!(w.north(), 23.0);
}

#[test]
fn test_window_world() {
    let w = GeoWindow::world();
    assert_eq!(w.lon_span(), 360.0);
    assert_eq!(w.lat_span(), 180.0);
}

#[test]
fn test_window_rejects_inverted_latitudes() {
    let result = GeoWindow::new(0.0, 10.0, 20.0, 20.0);
    assert!(matches!(result, Err(GeoWindowError::Inverted { .. })));
}

#[test]
fn test_window_rejects_out_of_range() {
    assert!(matches!(
        GeoWindow::new(-361.0, 0.0, 0.0, 10.0),
        Err(GeoWindowError::LongitudeOutOfRange(_))
    ));
    assert!(matches!(
        GeoWindow::new(0.0, 10.0, -91.0, 10.0),
        Err(GeoWindowError::LatitudeOutOfRange(_))
    ));
    assert!(matches!(
        GeoWindow::new(0.0, 10.0, 0.0, 90.5),
        Err(GeoWindowError::LatitudeOutOfRange(_))
    ));
}

#[test]
fn test_window_rejects_zero_longitude_span() {
    assert_eq!(
        GeoWindow::new(-155.0, -155.0, 18.0, 20.0),
        Err(GeoWindowError::ZeroWidth(-155.0))
    );
    let err: plot_common::PlotError = GeoWindowError::ZeroWidth(0.0).into();
    assert!(matches!(err, plot_common::PlotError::InvalidArea(_)));

    // Same meridian written two ways is a full turn, not zero.
    assert_eq!(GeoWindow::new(-180.0, 180.0, 18.0, 20.0).unwrap().lon_span(), 360.0);
}

#[test]
fn test_window_rejects_nan() {
    assert_eq!(
        GeoWindow::new(f64::NAN, 0.0, 0.0, 1.0),
        Err(GeoWindowError::NotFinite)
    );
}

// ============================================================================
// Antimeridian tests
// ============================================================================

#[test]
fn test_span_crossing_antimeridian() {
    let w = GeoWindow::new(170.0, -170.0, -10.0, 10.0).unwrap();
    assert!(w.crosses_antimeridian());
    assert!((w.lon_span() - 20.0).abs() < 1e-9);
}

#[test]
fn test_center_crossing_antimeridian() {
    let w = GeoWindow::new(170.0, -170.0, -10.0, 10.0).unwrap();
    let (lon, lat) = w.center();
    assert!((lon - (-180.0)).abs() < 1e-9);
    assert_eq!(lat, 0.0);
}

#[test]
fn test_center_negative_west() {
    let w = GeoWindow::new(-200.0, 40.0, -10.0, 30.0).unwrap();
    let (lon, lat) = w.center();
    assert!((lon - (-80.0)).abs() < 1e-9);
    assert!((lat - 10.0).abs() < 1e-9);
}

#[test]
fn test_contains_wrapped() {
    let w = GeoWindow::new(170.0, -170.0, -10.0, 10.0).unwrap();
    assert!(w.contains(175.0, 0.0));
    assert!(w.contains(-175.0, 0.0));
    assert!(w.contains(185.0, 0.0));
    assert!(!w.contains(0.0, 0.0));
    assert!(!w.contains(175.0, 11.0));
}

#[test]
fn test_contains_edges_inclusive() {
    let w = GeoWindow::new(-160.0, -154.0, 18.0, 23.0).unwrap();
    assert!(w.contains(-160.0, 18.0));
    assert!(w.contains(-154.0, 23.0));
    assert!(!w.contains(-153.9, 20.0));
}

#[test]
fn test_normalize_longitude() {
    assert_eq!(normalize_longitude(190.0), -170.0);
    assert_eq!(normalize_longitude(-190.0), 170.0);
    assert_eq!(normalize_longitude(180.0), -180.0);
    assert_eq!(normalize_longitude(0.0), 0.0);
}

// ============================================================================
// Label filtering
// ============================================================================

#[test]
fn test_filter_labels() {
    let w = GeoWindow::new(-156.0, -154.0, 19.0, 20.0).unwrap();
    let labels = vec![
        GeoLabel::new("KIPU", -155.3, 19.4),
        GeoLabel::new("MLO", -155.6, 19.5),
        GeoLabel::new("HNL", -157.9, 21.3),
    ];
    let kept = w.filter_labels(labels);
    let names: Vec<_> = kept.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(names, vec!["KIPU", "MLO"]);
}
