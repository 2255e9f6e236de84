use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

/// Planar projective transform acting on `(x, y)` points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Points that land on the line at infinity map to `None`.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        if v.z.abs() < 1e-12 {
            return None;
        }
        let (x, y) = (v.x / v.z, v.y / v.z);
        (x.is_finite() && y.is_finite()).then(|| Point2::new(x, y))
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }
}

/// Similarity moving the centroid of `pts` to the origin with mean radius
/// `sqrt(2)`, together with the conditioned points.
fn condition(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let centroid = pts.iter().fold(Vector3::<f64>::zeros(), |acc, p| {
        acc + Vector3::new(p.x, p.y, 0.0)
    }) / n;
    let radius = pts
        .iter()
        .map(|p| (p.x - centroid.x).hypot(p.y - centroid.y))
        .sum::<f64>()
        / n;
    let scale = if radius > 1e-12 {
        std::f64::consts::SQRT_2 / radius
    } else {
        1.0
    };

    let t = Matrix3::new(
        scale, 0.0, -scale * centroid.x, //
        0.0, scale, -scale * centroid.y, //
        0.0, 0.0, 1.0,
    );
    let conditioned = pts
        .iter()
        .map(|p| Point2::new(scale * (p.x - centroid.x), scale * (p.y - centroid.y)))
        .collect();
    (conditioned, t)
}

/// Undo the conditioning on both sides and scale so that `h33 == 1`.
fn uncondition(hn: Matrix3<f64>, t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>) -> Option<Homography> {
    let h = t_dst.try_inverse()? * hn * t_src;
    let h33 = h[(2, 2)];
    (h33.abs() >= 1e-12).then(|| Homography::new(h / h33))
}

fn twice_area(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    (b - a).perp(&(c - a))
}

fn degenerate(q: &[Point2<f64>; 4]) -> bool {
    (0..4).any(|skip| {
        let mut rest = (0..4).filter(|&k| k != skip).map(|k| q[k]);
        match (rest.next(), rest.next(), rest.next()) {
            (Some(a), Some(b), Some(c)) => twice_area(a, b, c).abs() < 1e-9,
            _ => true,
        }
    })
}

/// Estimate `H` with `dst ~ H * src` from four or more correspondences.
///
/// Four points go through [`homography_from_4pt`]; more are fitted in the
/// least-squares sense (conditioned DLT).
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    if let (Ok(s), Ok(d)) = (
        <&[Point2<f64>; 4]>::try_from(src),
        <&[Point2<f64>; 4]>::try_from(dst),
    ) {
        return homography_from_4pt(s, d);
    }

    let (s, t_src) = condition(src);
    let (d, t_dst) = condition(dst);

    let mut a = DMatrix::<f64>::zeros(2 * s.len(), 9);
    for (k, (p, q)) in s.iter().zip(&d).enumerate() {
        let row_u = [-p.x, -p.y, -1.0, 0.0, 0.0, 0.0, q.x * p.x, q.x * p.y, q.x];
        let row_v = [0.0, 0.0, 0.0, -p.x, -p.y, -1.0, q.y * p.x, q.y * p.y, q.y];
        for c in 0..9 {
            a[(2 * k, c)] = row_u[c];
            a[(2 * k + 1, c)] = row_v[c];
        }
    }

    // Null vector: last row of V^T.
    let v_t = a.svd(false, true).v_t?;
    let h = v_t.row(v_t.nrows().checked_sub(1)?);
    let hn = Matrix3::from_fn(|r, c| h[3 * r + c]);
    uncondition(hn, &t_src, &t_dst)
}

/// Exact `H` with `dst ~ H * src` for a quadrilateral pair.
///
/// Corners must be listed in the same order on both sides. Returns `None`
/// when either quad has three collinear corners.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    if degenerate(src) || degenerate(dst) {
        return None;
    }
    let (s, t_src) = condition(src);
    let (d, t_dst) = condition(dst);

    // h33 fixed to 1; eight unknowns, two equations per corner.
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for (k, (p, q)) in s.iter().zip(&d).enumerate() {
        let u = [p.x, p.y, 1.0, 0.0, 0.0, 0.0, -q.x * p.x, -q.x * p.y];
        let v = [0.0, 0.0, 0.0, p.x, p.y, 1.0, -q.y * p.x, -q.y * p.y];
        for c in 0..8 {
            a[(2 * k, c)] = u[c];
            a[(2 * k + 1, c)] = v[c];
        }
        b[2 * k] = q.x;
        b[2 * k + 1] = q.y;
    }

    let x = a.lu().solve(&b)?;
    if !x.iter().all(|v| v.is_finite()) {
        return None;
    }
    let hn = Matrix3::from_fn(|r, c| if r == 2 && c == 2 { 1.0 } else { x[3 * r + c] });
    uncondition(hn, &t_src, &t_dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        assert!((a - b).norm() < tol, "{a:?} vs {b:?}");
    }

    fn camera_tilt() -> Homography {
        Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ))
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = camera_tilt();
        let inv = h.inverse().expect("invertible");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(319.0, 239.0),
        ] {
            let q = h.apply(p).expect("finite");
            assert_close(inv.apply(q).expect("finite"), p, 1e-6);
        }
    }

    #[test]
    fn four_point_solve_recovers_h() {
        let tilt = camera_tilt();
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(180.0, 130.0),
            Point2::new(0.0, 130.0),
        ];
        let dst = src.map(|p| tilt.apply(p).expect("finite"));
        let recovered = homography_from_4pt(&src, &dst).expect("recoverable");
        for p in [Point2::new(60.0, 40.0), Point2::new(150.0, 120.0)] {
            assert_close(
                recovered.apply(p).expect("finite"),
                tilt.apply(p).expect("finite"),
                1e-6,
            );
        }
    }

    #[test]
    fn dlt_handles_overdetermined_case() {
        let tilt = camera_tilt();
        let src: Vec<Point2<f64>> = (0..3)
            .flat_map(|y| (0..3).map(move |x| Point2::new(x as f64 * 40.0, y as f64 * 50.0)))
            .collect();
        let dst: Vec<_> = src.iter().map(|&p| tilt.apply(p).expect("finite")).collect();
        let est = estimate_homography(&src, &dst).expect("estimate");
        for p in [Point2::new(60.0, 40.0), Point2::new(80.0, 90.0)] {
            assert_close(est.apply(p).expect("finite"), tilt.apply(p).expect("finite"), 1e-6);
        }
    }

    #[test]
    fn collinear_quad_is_rejected() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
            Point2::new(3.0, 3.0),
        ];
        let dst = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(homography_from_4pt(&src, &dst).is_none());
    }

    #[test]
    fn mismatched_input_lengths_fail() {
        let src = [Point2::new(0.0, 0.0); 4];
        let dst = [Point2::new(1.0, 1.0); 3];
        assert!(estimate_homography(&src, &dst).is_none());
    }
}
