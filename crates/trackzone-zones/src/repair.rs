//! Landmark searches and edge bookkeeping shared by several zones.

use std::collections::VecDeque;

use trackzone_core::{distance_to_line, Point};

/// Point at fraction `frac` along `edge`, `None` for an empty edge.
#[inline]
pub(crate) fn at_fraction(edge: &[Point], frac: f64) -> Option<Point> {
    if edge.is_empty() {
        return None;
    }
    let idx = ((edge.len() as f64 * frac) as usize).min(edge.len() - 1);
    Some(edge[idx])
}

/// Lowest cone (largest row) within `max_dist` of the line through `a`
/// and `b`.
pub(crate) fn lowest_cone_near_line(
    cones: &[Point],
    a: Point,
    b: Point,
    max_dist: f64,
) -> Option<Point> {
    cones
        .iter()
        .copied()
        .filter(|&c| distance_to_line(a, b, c) < max_dist)
        .max_by_key(|c| c.row)
}

/// Cone closest to the image top.
#[inline]
pub(crate) fn highest(cones: &[Point]) -> Option<Point> {
    cones.iter().copied().min_by_key(|c| c.row)
}

/// Cut an edge down to `frac` of its length when it is longer than
/// `min_len`.
pub(crate) fn keep_head(edge: &mut Vec<Point>, frac: f64, min_len: usize) {
    if edge.len() > min_len {
        let n = (edge.len() as f64 * frac) as usize;
        edge.truncate(n);
    }
}

/// Edge pair recorded while driving in, replayed newest first on the way
/// out. Oldest entries are dropped once `capacity` is reached.
#[derive(Clone, Debug, PartialEq)]
pub struct PathHistory {
    entries: VecDeque<(Vec<Point>, Vec<Point>)>,
    capacity: usize,
}

impl PathHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    pub fn push(&mut self, left: &[Point], right: &[Point]) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((left.to_vec(), right.to_vec()));
    }

    /// Most recent entry.
    pub fn pop(&mut self) -> Option<(Vec<Point>, Vec<Point>)> {
        self.entries.pop_back()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_replays_newest_first_and_stays_bounded() {
        let mut h = PathHistory::new(3);
        for i in 0..5 {
            h.push(&[Point::new(i, 0)], &[]);
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.pop().map(|(l, _)| l[0].row), Some(4));
        assert_eq!(h.pop().map(|(l, _)| l[0].row), Some(3));
        assert_eq!(h.pop().map(|(l, _)| l[0].row), Some(2));
        assert!(h.pop().is_none());
    }

    #[test]
    fn lowest_cone_near_a_vertical_line() {
        let cones = [
            Point::new(100, 52),
            Point::new(150, 58),
            Point::new(200, 140),
        ];
        let a = Point::new(200, 50);
        let b = Point::new(120, 50);
        assert_eq!(
            lowest_cone_near_line(&cones, a, b, 50.0),
            Some(Point::new(150, 58))
        );
        assert_eq!(highest(&cones), Some(Point::new(100, 52)));
    }

    #[test]
    fn fractions_are_clamped_to_the_edge() {
        let edge: Vec<Point> = (0..10).map(|i| Point::new(239 - i, 5)).collect();
        assert_eq!(at_fraction(&edge, 0.5), Some(Point::new(234, 5)));
        assert_eq!(at_fraction(&edge, 1.0), Some(Point::new(230, 5)));
        assert_eq!(at_fraction(&[], 0.3), None);
    }
}
