//! Pixel to data coordinate transforms emitted per panel.

use serde::{Deserialize, Serialize};

use crate::panel::PanelGeometry;

/// How a client interprets a [`TransformVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Projected map coordinates; slots 6-7 hold the projection origin
    Map,
    /// Plain value against value
    Xy,
    /// Time against value
    Ty,
}

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Map => "map",
            TransformKind::Xy => "xy",
            TransformKind::Ty => "ty",
        }
    }
}

/// The 8-value pixel/data mapping of one panel.
///
/// `data_x = x_offset + px * x_scale` and `data_y = y_offset + py * y_scale`.
/// On the wire it is `{"type": kind, "translation": [8 values]}` in field
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "TransformWire", from = "TransformWire")]
pub struct TransformVector {
    pub kind: TransformKind,
    pub x_scale: f64,
    pub x_offset: f64,
    pub y_scale: f64,
    pub y_offset: f64,
    /// Primary domain extrema (time range, or map start/end time)
    pub extent_min: f64,
    pub extent_max: f64,
    /// Projection origin in degrees; zero for non-map panels
    pub origin_x: f64,
    pub origin_y: f64,
}

impl TransformVector {
    /// Linear mapping of the panel's pixel box onto `x_range` by `y_range`.
    ///
    /// The top pixel row maps to the maximum y value. Extents default to
    /// `x_range`.
    pub fn linear(
        kind: TransformKind,
        geometry: &PanelGeometry,
        x_range: (f64, f64),
        y_range: (f64, f64),
    ) -> Self {
        let (px, py) = (f64::from(geometry.x), f64::from(geometry.y));
        let (w, h) = (f64::from(geometry.width), f64::from(geometry.height));

        let x_scale = (x_range.1 - x_range.0) / w;
        let y_scale = -(y_range.1 - y_range.0) / h;
        Self {
            kind,
            x_scale,
            x_offset: x_range.0 - px * x_scale,
            y_scale,
            y_offset: y_range.1 - py * y_scale,
            extent_min: x_range.0,
            extent_max: x_range.1,
            origin_x: 0.0,
            origin_y: 0.0,
        }
    }

    pub fn with_extents(mut self, min: f64, max: f64) -> Self {
        self.extent_min = min;
        self.extent_max = max;
        self
    }

    pub fn with_origin(mut self, lon: f64, lat: f64) -> Self {
        self.origin_x = lon;
        self.origin_y = lat;
        self
    }

    pub fn pixel_to_data(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.x_offset + px * self.x_scale,
            self.y_offset + py * self.y_scale,
        )
    }

    pub fn data_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.x_offset) / self.x_scale, (y - self.y_offset) / self.y_scale)
    }

    pub fn to_array(&self) -> [f64; 8] {
        [
            self.x_scale,
            self.x_offset,
            self.y_scale,
            self.y_offset,
            self.extent_min,
            self.extent_max,
            self.origin_x,
            self.origin_y,
        ]
    }

    pub fn from_array(kind: TransformKind, v: [f64; 8]) -> Self {
        Self {
            kind,
            x_scale: v[0],
            x_offset: v[1],
            y_scale: v[2],
            y_offset: v[3],
            extent_min: v[4],
            extent_max: v[5],
            origin_x: v[6],
            origin_y: v[7],
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TransformWire {
    #[serde(rename = "type")]
    kind: TransformKind,
    translation: [f64; 8],
}

impl From<TransformVector> for TransformWire {
    fn from(t: TransformVector) -> Self {
        Self {
            kind: t.kind,
            translation: t.to_array(),
        }
    }
}

impl From<TransformWire> for TransformVector {
    fn from(w: TransformWire) -> Self {
        TransformVector::from_array(w.kind, w.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> PanelGeometry {
        PanelGeometry::new(75, 19, 610, 140).unwrap()
    }

    #[test]
    fn test_corners_map_to_ranges() {
        let t = TransformVector::linear(TransformKind::Ty, &geometry(), (0.0, 86_400.0), (0.0, 10.0));
        let (x, y) = t.pixel_to_data(75.0, 19.0);
        assert!((x - 0.0).abs() < 1e-9);
        assert!((y - 10.0).abs() < 1e-9);
        let (x, y) = t.pixel_to_data(685.0, 159.0);
        assert!((x - 86_400.0).abs() < 1e-6);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn test_inverse() {
        let t = TransformVector::linear(TransformKind::Xy, &geometry(), (-5.0, 5.0), (100.0, 300.0));
        let (px, py) = t.data_to_pixel(1.5, 250.0);
        let (x, y) = t.pixel_to_data(px, py);
        assert!((x - 1.5).abs() < 1e-9);
        assert!((y - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_wire_shape() {
        let t = TransformVector::linear(TransformKind::Map, &geometry(), (0.0, 1.0), (0.0, 1.0))
            .with_extents(10.0, 20.0)
            .with_origin(-155.0, 19.5);
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json["type"], "map");
        let arr = json["translation"].as_array().unwrap();
        assert_eq!(arr.len(), 8);
        assert_eq!(arr[4], 10.0);
        assert_eq!(arr[5], 20.0);
        assert_eq!(arr[6], -155.0);
        assert_eq!(arr[7], 19.5);

        let back: TransformVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }
}
