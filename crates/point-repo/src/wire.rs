//! JSON bodies exchanged with the points service.

use geo_core::Coordinate;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/points`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePointsRequest {
    #[serde(rename = "updatedPoints")]
    pub updated_points: Vec<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_body_uses_camel_case_field() {
        let body = UpdatePointsRequest {
            updated_points: vec![Coordinate::new(1.5, -2.0).unwrap()],
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"updatedPoints":[[1.5,-2.0]]}"#);
    }
}
