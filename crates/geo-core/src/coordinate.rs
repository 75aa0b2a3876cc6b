use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

pub const MIN_LONGITUDE: f64 = -180.0;
pub const MAX_LONGITUDE: f64 = 180.0;
pub const MIN_LATITUDE: f64 = -90.0;
pub const MAX_LATITUDE: f64 = 90.0;

/// A (longitude, latitude) pair in degrees.
///
/// On the wire a coordinate is a two element JSON array `[longitude, latitude]`,
/// the same order map libraries use. Deserialisation validates the range.
/// Fields are private, so every value has passed [`Coordinate::validate`]:
///
/// ```compile_fail
/// let bad = geo_core::Coordinate { longitude: 0.0, latitude: 100.0 };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    longitude: f64,
    latitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting values outside the geographic domain.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, GeoError> {
        let coordinate = Self {
            longitude,
            latitude,
        };
        coordinate.validate()?;
        Ok(coordinate)
    }

    /// Out-of-range values for exercising validation paths.
    #[cfg(test)]
    pub(crate) fn unchecked(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Check the longitude/latitude ranges. NaN is never in range.
    pub fn validate(&self) -> Result<(), GeoError> {
        let lon_ok = (MIN_LONGITUDE..=MAX_LONGITUDE).contains(&self.longitude);
        let lat_ok = (MIN_LATITUDE..=MAX_LATITUDE).contains(&self.latitude);
        if lon_ok && lat_ok {
            Ok(())
        } else {
            Err(GeoError::InvalidCoordinate {
                longitude: self.longitude,
                latitude: self.latitude,
            })
        }
    }
}

impl TryFrom<[f64; 2]> for Coordinate {
    type Error = GeoError;

    fn try_from([longitude, latitude]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(longitude, latitude)
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(coordinate: Coordinate) -> Self {
        [coordinate.longitude, coordinate.latitude]
    }
}

impl fmt::Display for Coordinate {
    /// Five decimal places, longitude first.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.longitude, self.latitude)
    }
}
