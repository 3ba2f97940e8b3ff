//! Known landmark map in the global frame.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// A single map landmark in the global frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: i32,
    pub x: f64,
    pub y: f64,
}

impl Landmark {
    pub fn new(id: i32, x: f64, y: f64) -> Self {
        Landmark { id, x, y }
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// Ordered, read-only collection of landmarks.
///
/// The iteration order is the order the landmarks were supplied in and is what makes
/// nearest-neighbor tie-breaking deterministic. The map is shared by reference with the
/// filter for its whole lifetime and never mutated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkMap {
    landmarks: Vec<Landmark>,
}

impl LandmarkMap {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        LandmarkMap { landmarks }
    }

    /// Build a `columns x rows` grid of landmarks starting at `origin`, ids counting from 1.
    pub fn grid(origin: Point2<f64>, columns: usize, rows: usize, spacing: f64) -> Self {
        let mut landmarks = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for column in 0..columns {
                landmarks.push(Landmark::new(
                    (landmarks.len() + 1) as i32,
                    origin.x + column as f64 * spacing,
                    origin.y + row as f64 * spacing,
                ));
            }
        }
        LandmarkMap { landmarks }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn get(&self, id: i32) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }
}

impl From<Vec<Landmark>> for LandmarkMap {
    fn from(landmarks: Vec<Landmark>) -> Self {
        LandmarkMap::new(landmarks)
    }
}

impl<'a> IntoIterator for &'a LandmarkMap {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.landmarks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout_and_ids() {
        let map = LandmarkMap::grid(Point2::new(-10.0, 5.0), 3, 2, 10.0);
        assert_eq!(map.len(), 6);
        assert_eq!(map.landmarks()[0], Landmark::new(1, -10.0, 5.0));
        assert_eq!(map.landmarks()[2], Landmark::new(3, 10.0, 5.0));
        assert_eq!(map.landmarks()[5], Landmark::new(6, 10.0, 15.0));
    }

    #[test]
    fn test_lookup_by_id_preserves_order() {
        let map = LandmarkMap::from(vec![
            Landmark::new(7, 1.0, 2.0),
            Landmark::new(3, -4.0, 0.5),
        ]);
        assert_eq!(map.get(3).map(|l| l.x), Some(-4.0));
        assert!(map.get(99).is_none());
        let ids: Vec<i32> = map.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![7, 3]);
    }

    #[test]
    fn test_empty_map() {
        let map = LandmarkMap::default();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }
}
