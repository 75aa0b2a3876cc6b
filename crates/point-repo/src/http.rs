use std::time::Duration;

use geo_core::{Coordinate, UserKey};
use reqwest::blocking::Client;
use tracing::debug;

use crate::{PersistenceError, PointRepository, wire::UpdatePointsRequest};

/// Repository backed by a remote points service.
///
/// Every request carries the configured timeout; any transport failure,
/// timeout or non-success status surfaces as an error so the caller can
/// invalidate its session instead of continuing on stale local state.
pub struct HttpRepository {
    client: Client,
    points_url: String,
}

impl HttpRepository {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PersistenceError> {
        let points_url = format!("{}/api/points", base_url.trim_end_matches('/'));
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|source| PersistenceError::Unavailable {
                url: points_url.clone(),
                source,
            })?;
        Ok(Self { client, points_url })
    }

    pub fn points_url(&self) -> &str {
        &self.points_url
    }

    fn unavailable(&self, source: reqwest::Error) -> PersistenceError {
        PersistenceError::Unavailable {
            url: self.points_url.clone(),
            source,
        }
    }

    fn check_status(&self, status: reqwest::StatusCode) -> Result<(), PersistenceError> {
        if status.is_success() {
            Ok(())
        } else {
            Err(PersistenceError::Status {
                url: self.points_url.clone(),
                status: status.as_u16(),
            })
        }
    }
}

impl PointRepository for HttpRepository {
    fn load(&self, user: &UserKey) -> Result<Vec<Coordinate>, PersistenceError> {
        let response = self
            .client
            .get(&self.points_url)
            .query(&[("user", user.as_str())])
            .send()
            .map_err(|err| self.unavailable(err))?;
        self.check_status(response.status())?;
        // Older services answer an unknown user with `null` or an empty body.
        let body = response.text().map_err(|err| self.unavailable(err))?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let points: Option<Vec<Coordinate>> =
            serde_json::from_str(&body).map_err(|source| PersistenceError::Malformed {
                url: self.points_url.clone(),
                source,
            })?;
        let points = points.unwrap_or_default();
        debug!("loaded {} points for {user}", points.len());
        Ok(points)
    }

    fn save(&self, user: &UserKey, points: &[Coordinate]) -> Result<(), PersistenceError> {
        let body = UpdatePointsRequest {
            updated_points: points.to_vec(),
        };
        let response = self
            .client
            .post(&self.points_url)
            .query(&[("user", user.as_str())])
            .json(&body)
            .send()
            .map_err(|err| self.unavailable(err))?;
        self.check_status(response.status())?;
        debug!("saved {} points for {user}", points.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_url_is_normalised() {
        let repo =
            HttpRepository::new("http://127.0.0.1:5000/", Duration::from_millis(50)).unwrap();
        assert_eq!(repo.points_url(), "http://127.0.0.1:5000/api/points");
    }

    #[test]
    fn unreachable_service_is_unavailable() {
        // Port 9 (discard) is closed on test machines; the connect fails fast.
        let repo = HttpRepository::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = repo.load(&UserKey::new("ana").unwrap()).unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }
}
