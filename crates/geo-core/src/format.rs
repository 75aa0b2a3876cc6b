//! Text rendering for the metrics panel shown after every mutation.

use std::fmt;

use crate::{bounds::BoundsReport, coordinate::Coordinate};

/// Format `value` with `decimals` places and comma thousands separators,
/// e.g. `1574296.296` → `"1,574,296.30"`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (integer, fraction) = match formatted.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(formatted.len() + integer.len() / 3 + 1);
    let is_zero = formatted.bytes().all(|b| b == b'0' || b == b'.');
    if value.is_sign_negative() && !is_zero {
        grouped.push('-');
    }
    for (pos, digit) in integer.chars().enumerate() {
        if pos > 0 && (integer.len() - pos) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(fraction) = fraction {
        grouped.push('.');
        grouped.push_str(fraction);
    }
    grouped
}

/// Metrics panel listing the four extremal points, the approximate area and
/// the share of the Earth's surface.
pub struct MetricsPanel<'a> {
    points: &'a [Coordinate],
    report: &'a BoundsReport,
}

impl<'a> MetricsPanel<'a> {
    pub fn new(points: &'a [Coordinate], report: &'a BoundsReport) -> Self {
        Self { points, report }
    }

    fn edge(&self, f: &mut fmt::Formatter<'_>, label: &str, index: Option<usize>) -> fmt::Result {
        match index.and_then(|idx| self.points.get(idx).map(|point| (idx, point))) {
            Some((idx, point)) => writeln!(f, "{label:<6} {point} (point #{idx})"),
            None => writeln!(f, "{label:<6} n/a"),
        }
    }
}

impl fmt::Display for MetricsPanel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extremes = &self.report.extremes;
        self.edge(f, "West:", extremes.west)?;
        self.edge(f, "East:", extremes.east)?;
        self.edge(f, "South:", extremes.south)?;
        self.edge(f, "North:", extremes.north)?;
        writeln!(
            f,
            "Area:  {} km²",
            group_thousands(self.report.area.area_square_km, 2)
        )?;
        write!(
            f,
            "Coverage: {:.2}% of Earth's surface",
            self.report.area.percent_of_earth_surface
        )
    }
}
