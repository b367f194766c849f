//! Transform vectors for each kind of panel.

use plot_common::{AxisRange, PanelGeometry, TimeRange, TransformKind, TransformVector};
use projection::MapFrame;

/// Time on x against `y` on the vertical axis. Slots 4-5 hold the time range.
pub fn time_series(geometry: &PanelGeometry, time: &TimeRange, y: AxisRange) -> TransformVector {
    TransformVector::linear(TransformKind::Ty, geometry, (time.start, time.end), (y.min, y.max))
        .with_extents(time.start, time.end)
}

/// Time on x against depth growing downward.
pub fn time_depth(geometry: &PanelGeometry, time: &TimeRange, depth: AxisRange) -> TransformVector {
    TransformVector::linear(TransformKind::Ty, geometry, (time.start, time.end), (depth.max, depth.min))
        .with_extents(time.start, time.end)
}

/// Value against value. `y` is (bottom, top); depth axes pass a descending
/// pair so depth grows downward.
pub fn value_plot(geometry: &PanelGeometry, x: AxisRange, y: (f64, f64)) -> TransformVector {
    TransformVector::linear(TransformKind::Xy, geometry, (x.min, x.max), y)
}

/// Projected map. Slots 4-5 hold the time range when there is one.
pub fn map(frame: &MapFrame, time: Option<&TimeRange>) -> TransformVector {
    let t = frame.transform();
    match time {
        Some(range) => t.with_extents(range.start, range.end),
        None => t.with_extents(0.0, 0.0),
    }
}
