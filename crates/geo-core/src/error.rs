use thiserror::Error;

/// Contract violations raised by the point store and coordinate parsing.
///
/// Both variants reject the single operation that produced them; the store is
/// left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error(
        "coordinate ({longitude}, {latitude}) is outside longitude [-180, 180] / latitude [-90, 90]"
    )]
    InvalidCoordinate { longitude: f64, latitude: f64 },
    #[error("point index {index} is out of range for {len} points")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("user key must not be empty")]
    EmptyUserKey,
}

impl GeoError {
    /// Stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GeoError::InvalidCoordinate { .. } => "invalid_coordinate",
            GeoError::IndexOutOfRange { .. } => "index_out_of_range",
            GeoError::EmptyUserKey => "empty_user_key",
        }
    }
}
