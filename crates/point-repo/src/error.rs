use geo_core::GeoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("points service at {url} is unavailable")]
    Unavailable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("points service at {url} responded with {status}")]
    Status { url: String, status: u16 },
    #[error("points service at {url} returned a malformed point list")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Invalid(#[from] GeoError),
    #[error("record lock for user {user:?} was poisoned")]
    Poisoned { user: String },
}

impl PersistenceError {
    /// Stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PersistenceError::Unavailable { .. } => "unavailable",
            PersistenceError::Status { .. } => "status",
            PersistenceError::Malformed { .. } => "malformed",
            PersistenceError::Invalid(_) => "invalid",
            PersistenceError::Poisoned { .. } => "poisoned",
        }
    }
}
