//! Bezier curve synthesis over integer control polygons.
//!
//! This is the single gap-filling primitive every zone uses: pick a start
//! point, optional intermediate points and an end point, then sample the
//! curve at a fixed parameter step.

use crate::Point;

/// Errors returned when building a [`Bezier`] curve.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BezierError {
    #[error("bezier curve needs at least 2 control points, got {0}")]
    TooFewControlPoints(usize),
    #[error("bezier step must lie in (0, 1], got {0}")]
    InvalidStep(f64),
}

/// Bezier curve of degree `control.len() - 1`, sampled at `t = 0, dt, 2dt, ...`
/// up to and including the last `t <= 1`.
///
/// The curve is a value: iterating it does not consume it, so the same
/// samples can be produced any number of times.
#[derive(Clone, Debug, PartialEq)]
pub struct Bezier {
    dt: f64,
    control: Vec<Point>,
    weights: Vec<f64>,
    samples: usize,
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

impl Bezier {
    pub fn new(dt: f64, control: &[Point]) -> Result<Self, BezierError> {
        if control.len() < 2 {
            return Err(BezierError::TooFewControlPoints(control.len()));
        }
        if !(dt > 0.0 && dt <= 1.0) {
            return Err(BezierError::InvalidStep(dt));
        }

        let n = control.len() - 1;
        let weights = (0..=n)
            .map(|i| factorial(n) / (factorial(i) * factorial(n - i)))
            .collect();
        // Integer step count avoids drifting past t = 1 by accumulation.
        let samples = (1.0 / dt + 1e-9).floor() as usize + 1;

        Ok(Self {
            dt,
            control: control.to_vec(),
            weights,
            samples,
        })
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[inline]
    pub fn control(&self) -> &[Point] {
        &self.control
    }

    /// Number of samples the curve produces.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Evaluate the Bernstein sum at parameter `t`, truncating to integers.
    pub fn eval(&self, t: f64) -> Point {
        let n = self.control.len() - 1;
        let mut row = 0.0;
        let mut col = 0.0;
        for (i, (p, w)) in self.control.iter().zip(&self.weights).enumerate() {
            let k = w * t.powi(i as i32) * (1.0 - t).powi((n - i) as i32);
            row += k * p.row as f64;
            col += k * p.col as f64;
        }
        Point::new(row as i32, col as i32)
    }

    pub fn iter(&self) -> BezierIter<'_> {
        BezierIter {
            curve: self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &'a Bezier {
    type Item = Point;
    type IntoIter = BezierIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy sampler over a [`Bezier`] curve.
#[derive(Clone, Debug)]
pub struct BezierIter<'a> {
    curve: &'a Bezier,
    next: usize,
}

impl Iterator for BezierIter<'_> {
    type Item = Point;

    fn next(&mut self) -> Option<Point> {
        if self.next >= self.curve.samples {
            return None;
        }
        let t = (self.next as f64 * self.curve.dt).min(1.0);
        self.next += 1;
        Some(self.curve.eval(t))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.curve.samples.saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for BezierIter<'_> {}

/// Sample a curve into a vector.
///
/// Invalid input (fewer than two control points, step outside `(0, 1]`)
/// yields an empty edge instead of an error, which is what the per-frame
/// repair code wants: a missing repair degrades to "no edge".
pub fn bezier(dt: f64, control: &[Point]) -> Vec<Point> {
    match Bezier::new(dt, control) {
        Ok(curve) => curve.iter().collect(),
        Err(err) => {
            log::debug!("skipping curve repair: {err}");
            Vec::new()
        }
    }
}

/// [`bezier`] followed by clamping every sample into image bounds.
pub fn bezier_clamped(dt: f64, control: &[Point]) -> Vec<Point> {
    bezier(dt, control).into_iter().map(Point::clamped).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_is_first_control_point() {
        let control = [Point::new(200, 10), Point::new(120, 160), Point::new(30, 300)];
        for dt in [0.01, 0.02, 0.05, 0.3, 1.0] {
            let curve = Bezier::new(dt, &control).expect("valid curve");
            let samples: Vec<_> = curve.iter().collect();
            assert!(!samples.is_empty());
            assert_eq!(samples[0], control[0]);
        }
    }

    #[test]
    fn sampling_includes_the_end_point_when_dt_divides_one() {
        let control = [Point::new(0, 0), Point::new(100, 50), Point::new(40, 200)];
        let samples = bezier(0.02, &control);
        assert_eq!(samples.len(), 51);
        assert_eq!(*samples.last().expect("non-empty"), control[2]);
    }

    #[test]
    fn linear_curve_stays_on_segment() {
        let a = Point::new(230, 20);
        let b = Point::new(30, 220);
        for p in bezier(0.04, &[a, b]) {
            // Segment a->b satisfies row + col = 250; truncation may shave one unit per axis.
            let s = p.row + p.col;
            assert!((248..=250).contains(&s), "{p:?} off the segment");
            assert!((30..=230).contains(&p.row));
            assert!((20..=220).contains(&p.col));
        }
    }

    #[test]
    fn curve_is_restartable() {
        let curve =
            Bezier::new(0.1, &[Point::new(1, 2), Point::new(50, 60), Point::new(9, 9)]).unwrap();
        let first: Vec<_> = curve.iter().collect();
        let second: Vec<_> = (&curve).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(curve.iter().len(), curve.len());
    }

    #[test]
    fn coincident_control_points_give_a_constant_curve() {
        let p = Point::new(80, 80);
        let samples = bezier(0.25, &[p, p, p]);
        assert_eq!(samples.len(), 5);
        assert!(samples.iter().all(|&q| q == p));
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert_eq!(
            Bezier::new(0.1, &[Point::new(0, 0)]),
            Err(BezierError::TooFewControlPoints(1))
        );
        assert!(matches!(
            Bezier::new(0.0, &[Point::new(0, 0), Point::new(1, 1)]),
            Err(BezierError::InvalidStep(_))
        ));
        assert!(bezier(1.5, &[Point::new(0, 0), Point::new(1, 1)]).is_empty());
    }

    #[test]
    fn clamped_curve_never_leaves_the_image() {
        let control = [Point::new(260, -40), Point::new(-80, 160), Point::new(30, 400)];
        assert!(bezier_clamped(0.05, &control).iter().all(|p| p.in_bounds()));
    }
}
