//! End-to-end plot requests against scripted backends.

use std::sync::Arc;
use std::time::Duration;

use backend::{DataSourceDescriptor, DataSourceRegistry, ExhaustionPolicy, VisualizationKind};
use plot_api::service::{PlotOutcome, PlotService};
use plot_common::{PlotError, TimeZoneSpec, TransformKind};
use test_utils::{assert_series_approx_eq, channels, ranks, registry_with, MockBackend, MockReply};

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn service(registry: DataSourceRegistry) -> PlotService {
    PlotService::new(Arc::new(registry), Duration::from_secs(60), TimeZoneSpec::utc())
}

fn quake_mock() -> MockBackend {
    MockBackend::new("hvo")
        .text("ranks", ranks::STANDARD)
        .binary("data", test_utils::three_hypocenters())
}

fn counts_request(extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut items = vec![
        ("n", "1"),
        ("src.0", "quakes"),
        ("st.0", "0"),
        ("et.0", "86400"),
        ("rk.0", "0"),
        ("plotType.0", "cnts"),
        ("cntsBin.0", "day"),
        ("west.0", "-180"),
        ("east.0", "180"),
        ("south.0", "-90"),
        ("north.0", "90"),
    ];
    items.extend_from_slice(extra);
    pairs(&items)
}

#[tokio::test]
async fn test_hypocenter_counts_end_to_end() {
    let mock = quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let outcome = svc.plot_at(&counts_request(&[]), 0.0).await.unwrap();
    let panels = match outcome {
        PlotOutcome::Rendered(panels) => panels,
        other => panic!("expected rendered panels, got {:?}", other),
    };
    assert_eq!(panels.len(), 1);

    let series = &panels[0].series;
    assert_eq!(series.keys, vec![0.0, 86400.0]);
    assert_series_approx_eq!(&series.column("count").unwrap().values, &[2.0, 1.0], 1e-9);
    assert_series_approx_eq!(&series.column("cumulative").unwrap().values, &[2.0, 3.0], 1e-9);
    assert_eq!(
        series.labels.top.as_deref(),
        Some("3 Reviewed earthquakes between 2000-01-01 and 2000-01-02 (UTC)")
    );
    assert_eq!(panels[0].transform.kind, TransformKind::Ty);

    // Rank 0 resolves to the best rank but is forwarded unchanged.
    let data = mock.calls_for("data");
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].get("rk"), Some("0"));
    assert_eq!(data[0].source(), "quakes_remote");
}

#[tokio::test]
async fn test_export_mode_csv() {
    let mock = quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let outcome = svc
        .plot_at(&counts_request(&[("o", "csv")]), 0.0)
        .await
        .unwrap();
    let csv = match outcome {
        PlotOutcome::Exported(csv) => csv,
        other => panic!("expected csv, got {:?}", other),
    };
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Source,Time,Reviewed_EventsPerDay,Reviewed_CumulativeCounts",
            "quakes,2000-01-01 12:00:00.000,2,2",
            "quakes,2000-01-02 12:00:00.000,1,3",
        ]
    );
}

#[tokio::test]
async fn test_validation_precedes_backend_io() {
    let mock = quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let err = svc
        .plot_at(&counts_request(&[("x.0", "-1")]), 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err.error, PlotError::InvalidRequest("x")));
    assert_eq!(err.panel, None);
    assert_eq!(mock.call_count(), 0);

    // Second panel is missing its start time; the first must not run.
    let mut request = counts_request(&[("src.1", "quakes")]);
    request.retain(|(k, _)| k != "n");
    request.push(("n".into(), "2".into()));
    let err = svc.plot_at(&request, 0.0).await.unwrap_err();
    assert_eq!(err.panel, Some(1));
    assert!(matches!(err.error, PlotError::MissingParameter(ref p) if p == "st"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_source() {
    let mock = quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));
    let err = svc
        .plot_at(&pairs(&[("n", "1"), ("src.0", "tilt"), ("st.0", "-1d")]), 0.0)
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 404);
    assert_eq!(err.body().code, "UnknownSource");
}

#[tokio::test]
async fn test_unknown_rank_skips_data_query() {
    let mock = quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let mut request = counts_request(&[]);
    request.retain(|(k, _)| k != "rk.0");
    request.push(("rk.0".into(), "9".into()));
    let err = svc.plot_at(&request, 0.0).await.unwrap_err();
    assert!(matches!(err.error, PlotError::UnknownRank(9)));
    assert_eq!(err.panel, Some(0));
    assert_eq!(err.http_status_code(), 404);
    assert!(mock.calls_for("data").is_empty());
}

#[tokio::test]
async fn test_connection_released_after_backend_failure() {
    let mock = MockBackend::new("hvo")
        .text("ranks", ranks::STANDARD)
        .fail("data", "database offline");
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let err = svc.plot_at(&counts_request(&[]), 0.0).await.unwrap_err();
    assert!(matches!(err.error, PlotError::BackendQuery(_)));
    assert_eq!(err.http_status_code(), 502);

    let pool = svc.registry().pool("hvo").unwrap();
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.available(), pool.capacity());
}

#[tokio::test]
async fn test_ranks_cached_across_requests() {
    let mock = quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    svc.plot_at(&counts_request(&[]), 0.0).await.unwrap();
    svc.plot_at(&counts_request(&[]), 0.0).await.unwrap();
    assert_eq!(mock.calls_for("ranks").len(), 1);
    assert_eq!(mock.calls_for("data").len(), 2);

    svc.caches().ranks.invalidate("quakes").await;
    svc.plot_at(&counts_request(&[]), 0.0).await.unwrap();
    assert_eq!(mock.calls_for("ranks").len(), 2);
}

fn two_source_registry(quakes: &MockBackend, strikes: &MockBackend) -> DataSourceRegistry {
    DataSourceRegistry::builder()
        .pool(quakes.pool(1, ExhaustionPolicy::FailFast))
        .pool(strikes.pool(1, ExhaustionPolicy::FailFast))
        .source(DataSourceDescriptor::new(
            "quakes",
            quakes.name(),
            "hypocenters",
            VisualizationKind::Hypocenter,
        ))
        .source(DataSourceDescriptor::new(
            "strikes",
            strikes.name(),
            "wwlln",
            VisualizationKind::Lightning,
        ))
        .build()
}

fn two_panel_request() -> Vec<(String, String)> {
    pairs(&[
        ("n", "2"),
        ("src.0", "quakes"),
        ("st.0", "0"),
        ("et.0", "86400"),
        ("west.0", "-156.2"),
        ("east.0", "-154.7"),
        ("south.0", "18.8"),
        ("north.0", "20.4"),
        ("src.1", "strikes"),
        ("st.1", "0"),
        ("et.1", "86400"),
        ("west.1", "-156.2"),
        ("east.1", "-154.7"),
        ("south.1", "18.8"),
        ("north.1", "20.4"),
        ("y.1", "300"),
    ])
}

#[tokio::test]
async fn test_panels_in_request_order() {
    let quakes = quake_mock();
    let strikes = MockBackend::new("wwlln")
        .text("ranks", ranks::SINGLE)
        .binary("data", test_utils::strokes());
    let svc = service(two_source_registry(&quakes, &strikes));

    let panels = match svc.plot_at(&two_panel_request(), 0.0).await.unwrap() {
        PlotOutcome::Rendered(panels) => panels,
        other => panic!("expected rendered panels, got {:?}", other),
    };
    assert_eq!(panels.len(), 2);
    assert_eq!(panels[0].source, "quakes");
    assert_eq!(panels[1].source, "strikes");
    assert_eq!(panels[1].geometry.y, 300);
    assert_eq!(panels[0].transform.kind, TransformKind::Map);
    assert_eq!(panels[1].series.len(), 2);
}

#[tokio::test]
async fn test_first_failing_panel_aborts() {
    let quakes = quake_mock();
    let strikes = MockBackend::new("wwlln")
        .text("ranks", ranks::SINGLE)
        .fail("data", "feed stalled");
    let svc = service(two_source_registry(&quakes, &strikes));

    let err = svc.plot_at(&two_panel_request(), 0.0).await.unwrap_err();
    assert_eq!(err.panel, Some(1));
    assert_eq!(quakes.calls_for("data").len(), 1);
    assert_eq!(svc.registry().pool("wwlln").unwrap().outstanding(), 0);
    assert_eq!(svc.registry().pool("hvo").unwrap().outstanding(), 0);
}

#[tokio::test]
async fn test_channel_map_panel() {
    let mock = MockBackend::new("hvo").text("channels", channels::HAWAII);
    let svc = service(registry_with(&mock, "rsam", VisualizationKind::Ratsam));

    let request = pairs(&[
        ("n", "1"),
        ("src.0", "channel_map"),
        ("subsrc.0", "rsam"),
        ("west.0", "-156.2"),
        ("east.0", "-154.7"),
        ("south.0", "18.8"),
        ("north.0", "20.4"),
    ]);
    let panels = match svc.plot_at(&request, 0.0).await.unwrap() {
        PlotOutcome::Rendered(panels) => panels,
        other => panic!("expected rendered panels, got {:?}", other),
    };
    assert_eq!(panels[0].kind, VisualizationKind::ChannelMap);
    assert_eq!(panels[0].series.annotations.len(), 2);
    assert_eq!(panels[0].series.labels.top.as_deref(), Some("2 stations"));
}

#[tokio::test]
async fn test_configured_channel_map_source() {
    let mock = MockBackend::new("hvo").text("channels", channels::HAWAII);
    let svc = service(registry_with(&mock, "stations", VisualizationKind::ChannelMap));

    let request = pairs(&[
        ("n", "1"),
        ("src.0", "stations"),
        ("west.0", "-156.2"),
        ("east.0", "-154.7"),
        ("south.0", "18.8"),
        ("north.0", "20.4"),
    ]);
    let panels = match svc.plot_at(&request, 0.0).await.unwrap() {
        PlotOutcome::Rendered(panels) => panels,
        other => panic!("expected rendered panels, got {:?}", other),
    };
    assert_eq!(panels[0].source, "stations");
    assert_eq!(panels[0].kind, VisualizationKind::ChannelMap);
    assert_eq!(panels[0].series.annotations.len(), 2);
    assert_eq!(mock.calls_for("channels")[0].source(), "stations_remote");
}

fn empty_quake_mock() -> MockBackend {
    MockBackend::new("hvo")
        .text("ranks", ranks::STANDARD)
        .reply("data", MockReply::Binary(None))
}

fn map_request(extra: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut request = counts_request(extra);
    request.retain(|(k, _)| k != "plotType.0");
    request.push(("plotType.0".into(), "map".into()));
    request
}

#[tokio::test]
async fn test_empty_result_counts() {
    let mock = empty_quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let panels = match svc.plot_at(&counts_request(&[]), 0.0).await.unwrap() {
        PlotOutcome::Rendered(panels) => panels,
        other => panic!("expected rendered panels, got {:?}", other),
    };
    let series = &panels[0].series;
    assert_eq!(series.keys, vec![0.0, 86400.0]);
    assert_series_approx_eq!(&series.column("count").unwrap().values, &[0.0, 0.0], 1e-9);
    assert_series_approx_eq!(&series.column("cumulative").unwrap().values, &[0.0, 0.0], 1e-9);
    assert_eq!(mock.calls_for("data").len(), 1);
}

#[tokio::test]
async fn test_empty_result_map() {
    let mock = empty_quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let panels = match svc.plot_at(&map_request(&[]), 0.0).await.unwrap() {
        PlotOutcome::Rendered(panels) => panels,
        other => panic!("expected rendered panels, got {:?}", other),
    };
    assert_eq!(panels.len(), 1);
    assert_eq!(panels[0].series.len(), 0);
    assert_eq!(panels[0].transform.kind, TransformKind::Map);
}

#[tokio::test]
async fn test_empty_result_export_has_header_only() {
    let mock = empty_quake_mock();
    let svc = service(registry_with(&mock, "quakes", VisualizationKind::Hypocenter));

    let csv = match svc.plot_at(&map_request(&[("o", "csv")]), 0.0).await.unwrap() {
        PlotOutcome::Exported(csv) => csv,
        other => panic!("expected csv, got {:?}", other),
    };
    assert_eq!(csv, "Source,Time,Lat,Lon,Depth,Magnitude\n");
}
