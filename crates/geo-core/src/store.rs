//! Authoritative ordered point set for one user session.

use crate::{coordinate::Coordinate, error::GeoError};

/// Ordered sequence of coordinates addressed by insertion position.
///
/// Indices are positional: removing a point shifts every later point down by
/// one, so an index is only meaningful against the snapshot it was read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointStore {
    points: Vec<Coordinate>,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted points, validating every entry.
    pub fn from_points(points: Vec<Coordinate>) -> Result<Self, GeoError> {
        let mut store = Self::new();
        store.replace(points)?;
        Ok(store)
    }

    /// Append a coordinate; its index is the previous length.
    pub fn add(&mut self, coordinate: Coordinate) -> Result<&[Coordinate], GeoError> {
        coordinate.validate()?;
        self.points.push(coordinate);
        Ok(&self.points)
    }

    /// Remove the point at `index`, shifting later points down.
    pub fn remove_at(&mut self, index: usize) -> Result<&[Coordinate], GeoError> {
        if index >= self.points.len() {
            return Err(GeoError::IndexOutOfRange {
                index,
                len: self.points.len(),
            });
        }
        self.points.remove(index);
        Ok(&self.points)
    }

    /// Swap in a whole new point set. Nothing is merged; a single invalid
    /// coordinate rejects the replacement and keeps the current contents.
    pub fn replace(&mut self, points: Vec<Coordinate>) -> Result<&[Coordinate], GeoError> {
        points.iter().try_for_each(Coordinate::validate)?;
        self.points = points;
        Ok(&self.points)
    }

    /// Owned snapshot in index order.
    pub fn to_ordered_sequence(&self) -> Vec<Coordinate> {
        self.points.clone()
    }

    pub fn as_slice(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<Coordinate> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat).unwrap()
    }

    #[test]
    fn add_appends_at_end() {
        let mut store = PointStore::new();
        store.add(c(1.0, 1.0)).unwrap();
        let points = store.add(c(2.0, 2.0)).unwrap();
        assert_eq!(points, &[c(1.0, 1.0), c(2.0, 2.0)]);
    }

    #[test]
    fn add_rejects_invalid_and_keeps_store() {
        let mut store = PointStore::from_points(vec![c(1.0, 1.0)]).unwrap();
        let bad = Coordinate::unchecked(200.0, 0.0);
        assert!(matches!(
            store.add(bad),
            Err(GeoError::InvalidCoordinate { .. })
        ));
        assert_eq!(store.as_slice(), &[c(1.0, 1.0)]);
    }

    #[test]
    fn remove_out_of_range_is_rejected() {
        let mut store = PointStore::from_points(vec![c(1.0, 1.0)]).unwrap();
        assert_eq!(
            store.remove_at(1),
            Err(GeoError::IndexOutOfRange { index: 1, len: 1 })
        );
        assert_eq!(store.len(), 1);

        let mut empty = PointStore::new();
        assert!(empty.remove_at(0).is_err());
    }

    #[test]
    fn remove_shifts_later_points() {
        let mut store =
            PointStore::from_points(vec![c(0.0, 0.0), c(1.0, 1.0), c(2.0, 2.0)]).unwrap();
        store.remove_at(0).unwrap();
        assert_eq!(store.get(0), Some(c(1.0, 1.0)));
        store.remove_at(0).unwrap();
        assert_eq!(store.as_slice(), &[c(2.0, 2.0)]);
    }

    #[test]
    fn replace_is_last_write_wins() {
        let mut store = PointStore::from_points(vec![c(0.0, 0.0), c(1.0, 1.0)]).unwrap();
        store.replace(vec![c(5.0, 5.0)]).unwrap();
        assert_eq!(store.to_ordered_sequence(), vec![c(5.0, 5.0)]);
    }

    #[test]
    fn replace_with_invalid_point_keeps_previous_set() {
        let mut store = PointStore::from_points(vec![c(0.0, 0.0)]).unwrap();
        let bad = Coordinate::unchecked(0.0, -91.0);
        assert!(store.replace(vec![c(3.0, 3.0), bad]).is_err());
        assert_eq!(store.as_slice(), &[c(0.0, 0.0)]);
    }
}
