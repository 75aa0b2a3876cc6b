//! Bounding box, extremal members and approximate coverage of a point set.
//!
//! The area is a planar rectangle in degree space scaled against the full
//! 360 x 180 grid, not a spherical surface integral. Stored expectations rely
//! on these exact numbers, so the approximation must not be refined here.

use serde::Serialize;

use crate::coordinate::Coordinate;

/// Approximate surface area of the Earth in square kilometres.
pub const EARTH_SURFACE_KM2: f64 = 510_072_000.0;
/// Area of the whole longitude/latitude grid in square degrees.
pub const GRID_SQUARE_DEGREES: f64 = 360.0 * 180.0;

/// Axis-aligned rectangle in degree space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub west: f64,
    pub east: f64,
    pub south: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn area_square_degrees(&self) -> f64 {
        (self.east - self.west).abs() * (self.north - self.south).abs()
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.west..=self.east).contains(&coordinate.longitude())
            && (self.south..=self.north).contains(&coordinate.latitude())
    }

    /// Closed ring west-south → east-south → east-north → west-north → start,
    /// suitable for drawing the box as a polygon.
    pub fn ring(&self) -> [[f64; 2]; 5] {
        [
            [self.west, self.south],
            [self.east, self.south],
            [self.east, self.north],
            [self.west, self.north],
            [self.west, self.south],
        ]
    }
}

/// Index of the first point reaching each edge of the box. `None` only when
/// the point set is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtremalIndices {
    pub west: Option<usize>,
    pub east: Option<usize>,
    pub south: Option<usize>,
    pub north: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AreaMetrics {
    /// Unrounded; use [`AreaMetrics::area_square_km_rounded`] for display.
    pub area_square_km: f64,
    pub percent_of_earth_surface: f64,
}

impl AreaMetrics {
    pub fn from_bounds(bounds: &BoundingBox) -> Self {
        let fraction = bounds.area_square_degrees() / GRID_SQUARE_DEGREES;
        Self {
            area_square_km: fraction * EARTH_SURFACE_KM2,
            percent_of_earth_surface: fraction * 100.0,
        }
    }

    pub fn area_square_km_rounded(&self) -> f64 {
        round_to(self.area_square_km, 2)
    }

    pub fn percent_rounded(&self) -> f64 {
        round_to(self.percent_of_earth_surface, 2)
    }
}

/// Everything derived from one point set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BoundsReport {
    pub bounds: BoundingBox,
    pub extremes: ExtremalIndices,
    pub area: AreaMetrics,
}

/// Derive the bounding box, extremal indices and area metrics for `points`.
///
/// An empty slice yields an all-zero box, no indices and zero area. Ties on an
/// extreme keep the lowest index because comparisons are strict during the
/// single left-to-right scan.
pub fn compute(points: &[Coordinate]) -> BoundsReport {
    let Some(first) = points.first() else {
        return BoundsReport::default();
    };

    let mut bounds = BoundingBox {
        west: first.longitude(),
        east: first.longitude(),
        south: first.latitude(),
        north: first.latitude(),
    };
    let mut west = 0;
    let mut east = 0;
    let mut south = 0;
    let mut north = 0;

    for (idx, point) in points.iter().enumerate().skip(1) {
        if point.longitude() < bounds.west {
            bounds.west = point.longitude();
            west = idx;
        }
        if point.longitude() > bounds.east {
            bounds.east = point.longitude();
            east = idx;
        }
        if point.latitude() < bounds.south {
            bounds.south = point.latitude();
            south = idx;
        }
        if point.latitude() > bounds.north {
            bounds.north = point.latitude();
            north = idx;
        }
    }

    BoundsReport {
        bounds,
        extremes: ExtremalIndices {
            west: Some(west),
            east: Some(east),
            south: Some(south),
            north: Some(north),
        },
        area: AreaMetrics::from_bounds(&bounds),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
