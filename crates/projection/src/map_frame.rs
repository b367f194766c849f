//! Fitting a projected geographic window into a panel's pixel box.

use plot_common::{GeoWindow, PanelGeometry, PlotError, PlotResult, TransformKind, TransformVector};

use crate::transverse_mercator::TransverseMercator;

/// Samples per window edge when measuring the projected extent.
const EDGE_SAMPLES: usize = 32;

/// A window's projection plus the pixel box it occupies.
///
/// The map keeps the projected aspect ratio and is centred in the panel.
#[derive(Debug, Clone, PartialEq)]
pub struct MapFrame {
    projection: TransverseMercator,
    window: GeoWindow,
    /// Projected extents (meters)
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    /// Fitted pixel box
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl MapFrame {
    /// Project `window` around its centroid and fit it into `geometry`.
    pub fn fit(window: &GeoWindow, geometry: &PanelGeometry) -> PlotResult<Self> {
        let projection = TransverseMercator::centered_on(window);

        let mut min_x = f64::MAX;
        let mut max_x = f64::MIN;
        let mut min_y = f64::MAX;
        let mut max_y = f64::MIN;

        let west = window.west();
        let east = west + window.lon_span();
        for t in 0..=EDGE_SAMPLES {
            let frac = t as f64 / EDGE_SAMPLES as f64;
            let lon = west + frac * (east - west);
            let lat = window.south() + frac * window.lat_span();
            for (lon, lat) in [
                (lon, window.south()),
                (lon, window.north()),
                (west, lat),
                (east, lat),
            ] {
                let (x, y) = projection.forward(lon, lat);
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }

        let data_w = max_x - min_x;
        let data_h = max_y - min_y;
        if !(data_w > 0.0 && data_h > 0.0) {
            return Err(PlotError::InvalidArea(format!(
                "window projects to an empty extent: {:?}",
                window
            )));
        }

        let box_w = f64::from(geometry.width);
        let box_h = f64::from(geometry.height);
        let pixels_per_meter = (box_w / data_w).min(box_h / data_h);
        let width = data_w * pixels_per_meter;
        let height = data_h * pixels_per_meter;

        Ok(Self {
            projection,
            window: *window,
            min_x,
            max_x,
            min_y,
            max_y,
            left: f64::from(geometry.x) + (box_w - width) / 2.0,
            top: f64::from(geometry.y) + (box_h - height) / 2.0,
            width,
            height,
        })
    }

    pub fn projection(&self) -> &TransverseMercator {
        &self.projection
    }

    pub fn window(&self) -> &GeoWindow {
        &self.window
    }

    /// Fitted pixel box as (left, top, width, height).
    pub fn pixel_box(&self) -> (f64, f64, f64, f64) {
        (self.left, self.top, self.width, self.height)
    }

    /// Projected extents as (min_x, max_x, min_y, max_y) in meters.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        (self.min_x, self.max_x, self.min_y, self.max_y)
    }

    /// Geographic point to projected meters.
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.projection.forward(lon, lat)
    }

    /// Geographic point to pixel position.
    pub fn to_pixel(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x, y) = self.project(lon, lat);
        self.transform().data_to_pixel(x, y)
    }

    /// Map-kind transform: pixels to projected meters, origin in slots 6-7.
    ///
    /// Extents are zero; callers with a time range set them.
    pub fn transform(&self) -> TransformVector {
        let x_scale = (self.max_x - self.min_x) / self.width;
        let y_scale = -(self.max_y - self.min_y) / self.height;
        let (lon0, lat0) = self.projection.origin();
        TransformVector {
            kind: TransformKind::Map,
            x_scale,
            x_offset: self.min_x - self.left * x_scale,
            y_scale,
            y_offset: self.max_y - self.top * y_scale,
            extent_min: 0.0,
            extent_max: 0.0,
            origin_x: lon0,
            origin_y: lat0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hawaii() -> GeoWindow {
        GeoWindow::new(-156.0, -154.5, 18.8, 20.3).unwrap()
    }

    #[test]
    fn test_fit_stays_inside_panel() {
        let g = PanelGeometry::new(75, 19, 610, 400).unwrap();
        let frame = MapFrame::fit(&hawaii(), &g).unwrap();
        let (left, top, w, h) = frame.pixel_box();
        assert!(left >= 75.0 - 1e-9 && left + w <= 685.0 + 1e-9);
        assert!(top >= 19.0 - 1e-9 && top + h <= 419.0 + 1e-9);
        // One dimension is filled exactly.
        assert!((w - 610.0).abs() < 1e-6 || (h - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_origin_is_window_center() {
        let g = PanelGeometry::default();
        let frame = MapFrame::fit(&hawaii(), &g).unwrap();
        let t = frame.transform();
        assert_eq!(t.kind, TransformKind::Map);
        assert!((t.origin_x - (-155.25)).abs() < 1e-9);
        assert!((t.origin_y - 19.55).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_inverts_through_projection() {
        let g = PanelGeometry::new(0, 0, 500, 500).unwrap();
        let frame = MapFrame::fit(&hawaii(), &g).unwrap();
        let (px, py) = frame.to_pixel(-155.0, 19.7);
        let (x, y) = frame.transform().pixel_to_data(px, py);
        let (lon, lat) = frame.projection().inverse(x, y);
        assert!((lon - (-155.0)).abs() < 1e-8);
        assert!((lat - 19.7).abs() < 1e-8);
    }

    #[test]
    fn test_separate_windows_have_separate_origins() {
        let g = PanelGeometry::default();
        let a = MapFrame::fit(&hawaii(), &g).unwrap();
        let b = MapFrame::fit(&GeoWindow::new(-123.0, -121.0, 46.0, 47.5).unwrap(), &g).unwrap();
        assert_ne!(a.transform().origin_x, b.transform().origin_x);
        let (ax, _) = a.project(-155.25, 19.55);
        assert!(ax.abs() < 1e-6);
    }

    #[test]
    fn test_north_is_up() {
        let g = PanelGeometry::new(0, 0, 500, 500).unwrap();
        let frame = MapFrame::fit(&hawaii(), &g).unwrap();
        let (_, py_south) = frame.to_pixel(-155.25, 19.0);
        let (_, py_north) = frame.to_pixel(-155.25, 20.0);
        assert!(py_north < py_south);
    }
}
