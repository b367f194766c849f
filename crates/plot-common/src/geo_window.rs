//! Geographic window types and operations.

use serde::{Deserialize, Serialize};

/// Longitudes may be expressed in either [-360, 0] or [0, 360] form.
pub const MIN_LONGITUDE: f64 = -360.0;
pub const MAX_LONGITUDE: f64 = 360.0;
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;

/// A geographic area of interest in degrees.
///
/// When `east < west` the window crosses the antimeridian and spans
/// `east - west + 360` degrees of longitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoWindow {
    west: f64,
    east: f64,
    south: f64,
    north: f64,
}

impl GeoWindow {
    /// Create a validated window.
    pub fn new(west: f64, east: f64, south: f64, north: f64) -> Result<Self, GeoWindowError> {
        if [west, east, south, north].iter().any(|v| !v.is_finite()) {
            return Err(GeoWindowError::NotFinite);
        }
        if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&west) {
            return Err(GeoWindowError::LongitudeOutOfRange(west));
        }
        if !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&east) {
            return Err(GeoWindowError::LongitudeOutOfRange(east));
        }
        if west == east {
            return Err(GeoWindowError::ZeroWidth(west));
        }
        if south < MIN_LATITUDE {
            return Err(GeoWindowError::LatitudeOutOfRange(south));
        }
        if north > MAX_LATITUDE {
            return Err(GeoWindowError::LatitudeOutOfRange(north));
        }
        if south >= north {
            return Err(GeoWindowError::Inverted { south, north });
        }
        Ok(Self {
            west,
            east,
            south,
            north,
        })
    }

    /// The whole globe.
    pub fn world() -> Self {
        Self {
            west: -180.0,
            east: 180.0,
            south: -90.0,
            north: 90.0,
        }
    }

    pub fn west(&self) -> f64 {
        self.west
    }

    pub fn east(&self) -> f64 {
        self.east
    }

    pub fn south(&self) -> f64 {
        self.south
    }

    pub fn north(&self) -> f64 {
        self.north
    }

    /// Longitude extent in degrees, accounting for antimeridian crossing.
    pub fn lon_span(&self) -> f64 {
        let span = self.east - self.west;
        if span < 0.0 {
            span + 360.0
        } else {
            span
        }
    }

    /// Latitude extent in degrees.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Whether the window wraps across the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.east < self.west
    }

    /// Center point as (lon, lat), with lon normalized to [-180, 180).
    pub fn center(&self) -> (f64, f64) {
        let lon = normalize_longitude(self.west + self.lon_span() / 2.0);
        let lat = (self.south + self.north) / 2.0;
        (lon, lat)
    }

    /// Check if a point lies inside the window (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !(self.south..=self.north).contains(&lat) {
            return false;
        }
        let span = self.lon_span();
        if span >= 360.0 {
            return true;
        }
        let offset = (lon - self.west).rem_euclid(360.0);
        offset <= span + 1e-9
    }

    /// Keep only the labels that fall inside the window.
    pub fn filter_labels(&self, labels: Vec<GeoLabel>) -> Vec<GeoLabel> {
        labels
            .into_iter()
            .filter(|l| self.contains(l.lon, l.lat))
            .collect()
    }
}

/// Normalize a longitude to [-180, 180).
pub fn normalize_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// A text annotation anchored to a geographic point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLabel {
    pub text: String,
    pub lon: f64,
    pub lat: f64,
}

impl GeoLabel {
    pub fn new(text: impl Into<String>, lon: f64, lat: f64) -> Self {
        Self {
            text: text.into(),
            lon,
            lat,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeoWindowError {
    #[error("window edges must be finite numbers")]
    NotFinite,
    #[error("longitude out of range: {0}")]
    LongitudeOutOfRange(f64),
    #[error("latitude out of range: {0}")]
    LatitudeOutOfRange(f64),
    #[error("south edge {south} is not below north edge {north}")]
    Inverted { south: f64, north: f64 },
    #[error("west and east edges are both {0}")]
    ZeroWidth(f64),
}

impl From<GeoWindowError> for crate::PlotError {
    fn from(err: GeoWindowError) -> Self {
        crate::PlotError::InvalidArea(err.to_string())
    }
}
