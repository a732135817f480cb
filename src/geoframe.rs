//! Georeferencing of the pixel grid
//!
//! A [`GeoFrame`] projects a geographic bounding box once and derives the north-up
//! [`AffineTransform`] for any grid shape from those projected bounds, so every band
//! of a source file lands on exactly the same coordinates.

use crate::errors::{Result, SatBandsError};
use crate::projection::{LonLat, ProjectionDef, Projector};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Geographic bounding rectangle in degrees (EPSG:4326)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Asia sector bounds of the L1C Mercator products.
    pub fn asia_sector() -> Self {
        Self::new(44.5, -10.0, 110.0, 45.5)
    }

    /// Corners in lon/lat order: SW, SE, NE, NW.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::Projection`] if any corner is not a valid lon/lat.
    pub fn corners(&self) -> Result<[LonLat; 4]> {
        Ok([
            LonLat::new(self.west, self.south)?,
            LonLat::new(self.east, self.south)?,
            LonLat::new(self.east, self.north)?,
            LonLat::new(self.west, self.north)?,
        ])
    }
}

/// Projected extent of a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedBounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl ProjectedBounds {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Affine pixel-to-map transform.
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
///
/// Pixel edges are integral: `(0, 0)` is the outer corner of the top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// North-up transform spanning `bounds` with a `width` x `height` grid.
    pub fn from_bounds(bounds: &ProjectedBounds, width: usize, height: usize) -> Self {
        Self {
            a: bounds.width() / width as f64,
            b: 0.0,
            c: bounds.left,
            d: 0.0,
            e: -bounds.height() / height as f64,
            f: bounds.top,
        }
    }

    /// Map a (column, row) pixel position to projected (x, y).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Map projected (x, y) back to fractional (column, row).
    ///
    /// Returns `None` for a singular transform.
    pub fn invert(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let dx = x - self.c;
        let dy = y - self.f;
        Some(((self.e * dx - self.b * dy) / det, (-self.d * dx + self.a * dy) / det))
    }

    /// GDAL ordering: [c, a, b, f, d, e]
    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Pixel size as (x resolution, y resolution), both positive
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.a.abs(), self.e.abs())
    }
}

/// Project `bounds` and derive the north-up affine transform for a grid.
///
/// # Errors
///
/// Returns [`SatBandsError::DegenerateFrame`] if the projected corners do not
/// satisfy `left < right` and `bottom < top`, and [`SatBandsError::Projection`]
/// if a corner cannot be projected.
pub fn build_transform(
    bounds: &GeoBounds,
    projector: &dyn Projector,
    pixel_width: usize,
    pixel_height: usize,
) -> Result<AffineTransform> {
    if pixel_width == 0 || pixel_height == 0 {
        return Err(SatBandsError::Shape {
            band: "frame".to_string(),
            shape: vec![pixel_height, pixel_width],
        });
    }
    let projected = project_bounds(bounds, projector)?;
    Ok(AffineTransform::from_bounds(&projected, pixel_width, pixel_height))
}

/// Project the four corners of `bounds` and take their envelope.
///
/// # Errors
///
/// See [`build_transform`].
pub fn project_bounds(bounds: &GeoBounds, projector: &dyn Projector) -> Result<ProjectedBounds> {
    let mut xs = [0.0_f64; 4];
    let mut ys = [0.0_f64; 4];
    for (i, corner) in bounds.corners()?.into_iter().enumerate() {
        let (x, y) = projector.forward(corner)?;
        xs[i] = x;
        ys[i] = y;
    }

    let projected = ProjectedBounds {
        left: xs.iter().copied().fold(f64::INFINITY, f64::min),
        right: xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        bottom: ys.iter().copied().fold(f64::INFINITY, f64::min),
        top: ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };

    // An envelope is always ordered, so also require the SW corner to project
    // left of SE and below NW; this rejects boxes that wrap the projection seam.
    if projected.right <= projected.left
        || projected.top <= projected.bottom
        || xs[1] <= xs[0]
        || ys[3] <= ys[0]
    {
        return Err(SatBandsError::DegenerateFrame {
            left: projected.left,
            right: projected.right,
            bottom: projected.bottom,
            top: projected.top,
        });
    }

    Ok(projected)
}

/// Shared, read-only georeferencing context of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFrame {
    projection: ProjectionDef,
    bounds: GeoBounds,
    projected: ProjectedBounds,
}

impl GeoFrame {
    /// Project `bounds` once under `projection`.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::DegenerateFrame`] or [`SatBandsError::Projection`];
    /// both are fatal for every product sharing the frame.
    pub fn new(bounds: GeoBounds, projection: ProjectionDef) -> Result<Self> {
        let projected = project_bounds(&bounds, &projection)?;
        debug!(
            crs = %projection,
            left = projected.left,
            bottom = projected.bottom,
            right = projected.right,
            top = projected.top,
            "projected frame bounds"
        );
        Ok(Self {
            projection,
            bounds,
            projected,
        })
    }

    pub fn projection(&self) -> &ProjectionDef {
        &self.projection
    }

    pub fn bounds(&self) -> &GeoBounds {
        &self.bounds
    }

    pub fn projected_bounds(&self) -> &ProjectedBounds {
        &self.projected
    }

    /// Affine transform for a grid of `(rows, cols)`.
    pub fn transform_for(&self, dim: (usize, usize)) -> AffineTransform {
        let (rows, cols) = dim;
        AffineTransform::from_bounds(&self.projected, cols.max(1), rows.max(1))
    }

    /// Pixel size in projected units for a grid of `(rows, cols)`.
    pub fn pixel_size(&self, dim: (usize, usize)) -> (f64, f64) {
        self.transform_for(dim).pixel_size()
    }

    /// Cells of a `(rows, cols)` grid whose centres fall inside `aoi`.
    ///
    /// The area of interest is projected with the frame's projection, so a
    /// lon/lat rectangle stays a rectangle in Mercator space.
    ///
    /// # Errors
    ///
    /// Returns [`SatBandsError::InvalidConfig`] if `aoi` does not project to a
    /// non-empty window.
    pub fn aoi_mask(&self, aoi: &GeoBounds, dim: (usize, usize)) -> Result<Array2<bool>> {
        let window = project_bounds(aoi, &self.projection).map_err(|e| {
            SatBandsError::invalid_config(format!("area of interest {aoi:?}: {e}"))
        })?;
        let t = self.transform_for(dim);
        Ok(Array2::from_shape_fn(dim, |(row, col)| {
            let (x, y) = t.apply(col as f64 + 0.5, row as f64 + 0.5);
            (window.left..=window.right).contains(&x) && (window.bottom..=window.top).contains(&y)
        }))
    }
}
