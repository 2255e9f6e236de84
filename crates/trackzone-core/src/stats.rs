//! Small statistics over point sets and edge sequences.

use crate::Point;

/// Value reported by [`edge_slope_stdev`] when the edge is too short to judge.
pub const SLOPE_STDEV_UNKNOWN: f64 = 1000.0;

const SLOPE_STEP: usize = 10;

/// Euclidean distance between two points.
#[inline]
pub fn distance(a: Point, b: Point) -> f64 {
    let dr = (a.row - b.row) as f64;
    let dc = (a.col - b.col) as f64;
    (dr * dr + dc * dc).sqrt()
}

/// Perpendicular distance from `p` to the infinite line through `a` and `b`.
///
/// A degenerate line (`a == b`) falls back to the point distance `|p - a|`.
pub fn distance_to_line(a: Point, b: Point, p: Point) -> f64 {
    let ab = distance(a, b);
    if ab < f64::EPSILON {
        return distance(a, p);
    }
    let cross = (b.col - a.col) as f64 * (p.row - a.row) as f64
        - (b.row - a.row) as f64 * (p.col - a.col) as f64;
    cross.abs() / ab
}

/// Arithmetic mean; `0` for an empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance; `0` for fewer than two samples.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Population variance of the column coordinates of `points`.
pub fn column_variance(points: &[Point]) -> f64 {
    let cols: Vec<f64> = points.iter().map(|p| p.col as f64).collect();
    variance(&cols)
}

/// Spread of the local slope along an edge.
///
/// Slopes are sampled every ten points as `dcol * 100 / drow` (integer
/// division, skipping flat pairs) and the sample standard deviation is
/// returned. Straight edges score close to zero; strongly curved or broken
/// ones score high. Edges shorter than `rows / 4` report
/// [`SLOPE_STDEV_UNKNOWN`].
pub fn edge_slope_stdev(edge: &[Point], rows: i32) -> f64 {
    if (edge.len() as i64) < (rows / 4) as i64 {
        return SLOPE_STDEV_UNKNOWN;
    }

    let slopes: Vec<f64> = (SLOPE_STEP..edge.len())
        .step_by(SLOPE_STEP)
        .filter_map(|i| {
            let (a, b) = (edge[i - SLOPE_STEP], edge[i]);
            let drow = b.row - a.row;
            (drow != 0).then(|| ((b.col - a.col) * 100 / drow) as f64)
        })
        .collect();

    if slopes.len() < 2 {
        return 0.0;
    }
    let m = mean(&slopes);
    let acc: f64 = slopes.iter().map(|s| (s - m) * (s - m)).sum();
    (acc / (slopes.len() - 1) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_edge(len: i32, col0: i32, dcol_per_row: i32) -> Vec<Point> {
        (0..len)
            .map(|i| Point::new(239 - i, col0 + i * dcol_per_row))
            .collect()
    }

    #[test]
    fn point_and_line_distances() {
        assert_relative_eq!(distance(Point::new(0, 0), Point::new(3, 4)), 5.0);

        let a = Point::new(0, 0);
        let b = Point::new(0, 10);
        assert_relative_eq!(distance_to_line(a, b, Point::new(7, 4)), 7.0);
        assert_relative_eq!(distance_to_line(a, a, Point::new(3, 4)), 5.0);
    }

    #[test]
    fn mean_and_variance() {
        assert_relative_eq!(mean(&[]), 0.0);
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_relative_eq!(variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 4.0);
        assert_relative_eq!(variance(&[3.0]), 0.0);
        let pts = [Point::new(0, 1), Point::new(0, 3)];
        assert_relative_eq!(column_variance(&pts), 1.0);
    }

    #[test]
    fn straight_edge_has_zero_slope_spread() {
        let edge = straight_edge(150, 40, 1);
        assert_relative_eq!(edge_slope_stdev(&edge, 240), 0.0);
    }

    #[test]
    fn short_edge_is_unknown() {
        let edge = straight_edge(20, 40, 0);
        assert_relative_eq!(edge_slope_stdev(&edge, 240), SLOPE_STDEV_UNKNOWN);
    }

    #[test]
    fn kinked_edge_has_large_spread() {
        let mut edge = straight_edge(80, 100, 0);
        let last = *edge.last().unwrap();
        edge.extend((1..=80).map(|i| Point::new(last.row - i, last.col + 2 * i)));
        assert!(edge_slope_stdev(&edge, 240) > 50.0);
    }
}
