//! Spherical Transverse Mercator projection.
//!
//! Each geographic panel gets its own instance centred on its window, so the
//! scale error stays small over the regional windows these plots show.
//!
//! The projection parameters include:
//! - Central meridian (lon0): longitude of the projection origin
//! - Origin latitude (lat0): latitude mapped to y = 0
//! - Earth radius: spherical approximation

use std::f64::consts::PI;

use plot_common::GeoWindow;

/// Mean Earth radius (meters).
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Keeps the forward transform finite 90 degrees from the central meridian.
const B_LIMIT: f64 = 1.0 - 1e-12;

/// Transverse Mercator projection parameters, scale factor 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransverseMercator {
    /// Central meridian in radians
    pub lon0: f64,
    /// Origin latitude in radians
    pub lat0: f64,
    /// Earth radius (meters)
    pub earth_radius: f64,
}

impl TransverseMercator {
    /// Create a projection with its origin at (lon, lat) in degrees.
    pub fn new(lon0_deg: f64, lat0_deg: f64) -> Self {
        let to_rad = PI / 180.0;
        Self {
            lon0: lon0_deg * to_rad,
            lat0: lat0_deg * to_rad,
            earth_radius: EARTH_RADIUS,
        }
    }

    /// Projection centred on the window's centroid.
    pub fn centered_on(window: &GeoWindow) -> Self {
        let (lon, lat) = window.center();
        Self::new(lon, lat)
    }

    /// Origin as (lon, lat) in degrees.
    pub fn origin(&self) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        (self.lon0 * to_deg, self.lat0 * to_deg)
    }

    /// Geographic (lon, lat in degrees) to projected (x, y in meters).
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;

        // Normalize longitude difference to [-π, π]
        let mut dlon = lon_deg * to_rad - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let b = (lat.cos() * dlon.sin()).clamp(-B_LIMIT, B_LIMIT);
        let x = 0.5 * self.earth_radius * ((1.0 + b) / (1.0 - b)).ln();
        let y = self.earth_radius * (lat.tan().atan2(dlon.cos()) - self.lat0);
        (x, y)
    }

    /// Projected (x, y in meters) to geographic (lon, lat in degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let xr = x / self.earth_radius;
        let d = y / self.earth_radius + self.lat0;

        let lat = (d.sin() / xr.cosh()).clamp(-1.0, 1.0).asin();
        let mut lon = self.lon0 + xr.sinh().atan2(d.cos());
        while lon > PI {
            lon -= 2.0 * PI;
        }
        while lon < -PI {
            lon += 2.0 * PI;
        }
        (lon * to_deg, lat * to_deg)
    }
}
