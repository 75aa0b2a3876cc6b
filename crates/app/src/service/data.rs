use chrono::{DateTime, Utc};
use geo_core::{BoundsReport, Coordinate, compute};
use point_repo::PointRecord;
use serde::Serialize;

/// Points of one user together with everything derived from them.
#[derive(Serialize)]
pub(crate) struct BoundsResponse<'a> {
    pub(crate) user: &'a str,
    pub(crate) revision: u64,
    pub(crate) updated_at: Option<DateTime<Utc>>,
    pub(crate) points: &'a [Coordinate],
    pub(crate) report: BoundsReport,
    /// Closed ring of the bounding box, absent for an empty set.
    pub(crate) polygon: Option<[[f64; 2]; 5]>,
}

impl<'a> BoundsResponse<'a> {
    pub(crate) fn new(user: &'a str, record: &'a PointRecord) -> Self {
        let points = record.points.as_slice();
        let report = compute(points);
        Self {
            user,
            revision: record.revision,
            updated_at: record.updated_at,
            points,
            polygon: (!points.is_empty()).then(|| report.bounds.ring()),
            report,
        }
    }
}
