//! Persistence collaborators for per-user point sets.
//!
//! Every repository speaks whole collections: `load` returns a user's full
//! point list and `save` overwrites it. Two implementations are provided:
//! [`MemoryRepository`] keeps records in-process behind one mutex per user,
//! and [`HttpRepository`] talks to a remote points service with a bounded
//! request timeout.

use geo_core::{Coordinate, UserKey};

mod error;
mod http;
mod memory;
pub mod wire;

pub use error::PersistenceError;
pub use http::HttpRepository;
pub use memory::{MemoryRepository, PointRecord};

/// Key-value persistence for point sets, keyed by user.
pub trait PointRepository: Send + Sync {
    /// Full point set for `user`; an unknown user yields an empty list.
    fn load(&self, user: &UserKey) -> Result<Vec<Coordinate>, PersistenceError>;

    /// Overwrite the stored point set for `user`.
    fn save(&self, user: &UserKey, points: &[Coordinate]) -> Result<(), PersistenceError>;
}
