//! Forward map projections from geographic coordinates.
//!
//! The transform builder only needs a forward mapping from (longitude, latitude)
//! in EPSG:4326 to projected (x, y), reached through the [`Projector`] trait.
//! [`ProjectionDef`] provides the projections the products are published in:
//! plain geographic, spherical Web Mercator, and the ellipsoidal Mercator with a
//! true-scale latitude used by the L1C sector products.

use crate::errors::{Result, SatBandsError};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_4;
use std::fmt;

/// WGS84 semi-major axis (meters)
pub const WGS84_A: f64 = 6_378_137.0;
/// Semi-minor axis used by the sector product definition (meters)
pub const SECTOR_B: f64 = 6_356_752.3142;

/// A geographic point, always longitude first.
///
/// Construction validates the latitude so a swapped (lat, lon) pair with a
/// longitude outside ±90 is rejected here instead of silently projecting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    /// # Errors
    ///
    /// Returns [`SatBandsError::Projection`] for non-finite input, a latitude
    /// outside [-90, 90] or a longitude outside [-360, 360].
    pub fn new(lon: f64, lat: f64) -> Result<Self> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(SatBandsError::Projection(format!(
                "non-finite coordinate (lon={lon}, lat={lat})"
            )));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(SatBandsError::Projection(format!(
                "latitude {lat} out of range; coordinates must be given as (lon, lat)"
            )));
        }
        if !(-360.0..=360.0).contains(&lon) {
            return Err(SatBandsError::Projection(format!(
                "longitude {lon} out of range"
            )));
        }
        Ok(Self { lon, lat })
    }
}

/// Geodesy service: forward projection of EPSG:4326 points.
pub trait Projector: Send + Sync {
    /// Project a geographic point to (x, y) in the target CRS.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::Projection`] if the point has no finite image
    /// (for example a pole under Mercator).
    fn forward(&self, point: LonLat) -> Result<(f64, f64)>;

    /// PROJ string describing the target CRS, handed to raster writers.
    fn proj_string(&self) -> String;
}

/// Target projection definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectionDef {
    /// EPSG:4326, x = longitude, y = latitude
    Geographic,
    /// EPSG:3857 spherical Mercator
    WebMercator,
    /// Ellipsoidal Mercator with a latitude of true scale
    Mercator {
        lon_0: f64,
        lat_ts: f64,
        a: f64,
        b: f64,
    },
}

impl Default for ProjectionDef {
    fn default() -> Self {
        Self::sector_mercator()
    }
}

impl ProjectionDef {
    /// Mercator definition of the Asia sector L1C products.
    pub fn sector_mercator() -> Self {
        Self::Mercator {
            lon_0: 77.25,
            lat_ts: 17.75,
            a: WGS84_A,
            b: SECTOR_B,
        }
    }

    /// Short CRS label used in tags and logs
    pub fn crs_label(&self) -> String {
        match self {
            Self::Geographic => "EPSG:4326".to_string(),
            Self::WebMercator => "EPSG:3857".to_string(),
            Self::Mercator { .. } => self.proj_string(),
        }
    }
}

/// Wrap a longitude difference into [-180, 180).
fn wrap_degrees(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

fn finite_or_err(x: f64, y: f64, point: LonLat) -> Result<(f64, f64)> {
    if x.is_finite() && y.is_finite() {
        Ok((x, y))
    } else {
        Err(SatBandsError::Projection(format!(
            "point (lon={}, lat={}) has no finite projected image",
            point.lon, point.lat
        )))
    }
}

impl Projector for ProjectionDef {
    fn forward(&self, point: LonLat) -> Result<(f64, f64)> {
        if !matches!(self, Self::Geographic) && point.lat.abs() >= 90.0 {
            return Err(SatBandsError::Projection(format!(
                "pole (lat={}) has no Mercator image",
                point.lat
            )));
        }
        match *self {
            Self::Geographic => Ok((point.lon, point.lat)),
            Self::WebMercator => {
                let x = WGS84_A * point.lon.to_radians();
                let y = WGS84_A * (FRAC_PI_4 + point.lat.to_radians() / 2.0).tan().ln();
                finite_or_err(x, y, point)
            }
            Self::Mercator { lon_0, lat_ts, a, b } => {
                let e2 = 1.0 - (b * b) / (a * a);
                let e = e2.sqrt();
                let sin_ts = lat_ts.to_radians().sin();
                let k0 = lat_ts.to_radians().cos() / (1.0 - e2 * sin_ts * sin_ts).sqrt();

                let phi = point.lat.to_radians();
                let sin_phi = phi.sin();
                let x = a * k0 * wrap_degrees(point.lon - lon_0).to_radians();
                let conformal = ((1.0 - e * sin_phi) / (1.0 + e * sin_phi)).powf(e / 2.0);
                let y = a * k0 * ((FRAC_PI_4 + phi / 2.0).tan() * conformal).ln();
                finite_or_err(x, y, point)
            }
        }
    }

    fn proj_string(&self) -> String {
        match self {
            Self::Geographic => "+proj=longlat +datum=WGS84 +no_defs".to_string(),
            Self::WebMercator => {
                "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs"
                    .to_string()
            }
            Self::Mercator { lon_0, lat_ts, a, b } => format!(
                "+proj=merc +lon_0={lon_0} +lat_ts={lat_ts} +x_0=0 +y_0=0 +a={a} +b={b} +units=m +no_defs"
            ),
        }
    }
}

impl fmt::Display for ProjectionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.crs_label())
    }
}

/// Cardinal direction of an azimuth in degrees clockwise from north.
pub fn direction_from_azimuth(azimuth_deg: f64) -> &'static str {
    const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = ((azimuth_deg + 22.5).div_euclid(45.0)).rem_euclid(8.0) as usize;
    DIRECTIONS[index]
}
