//! Core types for marked map points: the per-session [`PointStore`], the
//! bounds/area derivation in [`bounds`], and the display helpers used by the
//! metrics panel.
//!
//! Everything here is synchronous and free of I/O so it can be driven by the
//! HTTP service and the interactive session alike.

pub mod bounds;
pub mod coordinate;
pub mod error;
pub mod format;
pub mod store;
pub mod user;

pub use bounds::{AreaMetrics, BoundingBox, BoundsReport, ExtremalIndices, compute};
pub use coordinate::Coordinate;
pub use error::GeoError;
pub use format::MetricsPanel;
pub use store::PointStore;
pub use user::UserKey;
