use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// Opaque identifier for whose point set is read or written.
///
/// Keys come from the session collaborator; the core never invents them. The
/// only rule enforced here is that a key is not blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserKey(String);

impl UserKey {
    pub fn new(key: impl Into<String>) -> Result<Self, GeoError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(GeoError::EmptyUserKey);
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserKey {
    type Error = GeoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserKey> for String {
    fn from(key: UserKey) -> Self {
        key.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
