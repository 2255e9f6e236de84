//! Camera frame to bird's-eye frame mapping.
//!
//! The mapping is a fixed homography estimated once from a configured
//! quadrilateral correspondence. In the bird's-eye frame lane edges are
//! (approximately) parallel, so a missing edge can be reconstructed by
//! shifting the visible one sideways by the lane width.

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::bezier::bezier_clamped;
use crate::homography::{estimate_homography, Homography};
use crate::{Point, Side};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("image and bird's-eye point lists differ in length ({image} vs {top})")]
    LengthMismatch { image: usize, top: usize },
    #[error("need at least 4 point correspondences, got {0}")]
    TooFewPoints(usize),
    #[error("point correspondences are degenerate")]
    Degenerate,
    #[error("homography is not invertible")]
    NotInvertible,
}

/// Calibration of the bird's-eye mapping.
///
/// Quadrilateral corners are `[x, y]` pairs, i.e. `[col, row]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveParams {
    /// Points in the camera frame.
    pub image_points: Vec<[f64; 2]>,
    /// Matching points in the bird's-eye frame.
    pub top_points: Vec<[f64; 2]>,
    /// Lane width in bird's-eye pixels used when no landmark pins it.
    pub lane_offset: f64,
    /// Bounds applied to landmark-derived lane widths.
    pub min_offset: f64,
    pub max_offset: f64,
    /// Bezier step used for predicted edges.
    pub curve_dt: f64,
}

impl Default for PerspectiveParams {
    fn default() -> Self {
        Self {
            image_points: vec![[0.0, 239.0], [319.0, 239.0], [215.0, 70.0], [105.0, 70.0]],
            top_points: vec![[100.0, 399.0], [220.0, 399.0], [220.0, 0.0], [100.0, 0.0]],
            lane_offset: 120.0,
            min_offset: 30.0,
            max_offset: 150.0,
            curve_dt: 0.05,
        }
    }
}

/// Read-only forward/inverse mapping shared by every zone.
#[derive(Clone, Debug)]
pub struct PerspectiveMapping {
    params: PerspectiveParams,
    image_to_top: Homography,
    top_to_image: Homography,
}

fn to_points(v: &[[f64; 2]]) -> Vec<Point2<f64>> {
    v.iter().map(|&[x, y]| Point2::new(x, y)).collect()
}

impl PerspectiveMapping {
    pub fn new(params: PerspectiveParams) -> Result<Self, MappingError> {
        let (n_img, n_top) = (params.image_points.len(), params.top_points.len());
        if n_img != n_top {
            return Err(MappingError::LengthMismatch {
                image: n_img,
                top: n_top,
            });
        }
        if n_img < 4 {
            return Err(MappingError::TooFewPoints(n_img));
        }

        let image_to_top = estimate_homography(
            &to_points(&params.image_points),
            &to_points(&params.top_points),
        )
        .ok_or(MappingError::Degenerate)?;
        let top_to_image = image_to_top.inverse().ok_or(MappingError::NotInvertible)?;

        Ok(Self {
            params,
            image_to_top,
            top_to_image,
        })
    }

    #[inline]
    pub fn params(&self) -> &PerspectiveParams {
        &self.params
    }

    /// Camera point to bird's-eye `(x, y)`.
    #[inline]
    pub fn to_top(&self, p: Point) -> Option<Point2<f64>> {
        self.image_to_top.apply(p.to_xy())
    }

    /// Bird's-eye `(x, y)` back to the nearest camera pixel.
    #[inline]
    pub fn to_image(&self, q: Point2<f64>) -> Option<Point> {
        self.top_to_image.apply(q).map(Point::from_xy)
    }

    /// Lateral bird's-eye distance between two landmarks, clamped to the
    /// configured bounds. Falls back to the default lane offset when either
    /// landmark does not map.
    pub fn lane_offset(&self, a: Point, b: Point) -> f64 {
        match (self.to_top(a), self.to_top(b)) {
            (Some(ta), Some(tb)) => (ta.x - tb.x)
                .abs()
                .clamp(self.params.min_offset, self.params.max_offset),
            _ => self.params.lane_offset,
        }
    }

    fn shifted(&self, p: Point, dx: f64) -> Option<Point> {
        let q = self.to_top(p)? + Vector2::new(dx, 0.0);
        self.to_image(q)
    }

    /// Reconstruct the lane edge on side `toward` from `edge`.
    ///
    /// The first, middle and last points of `edge` are shifted by `offset`
    /// bird's-eye pixels and joined by a quadratic Bezier. `anchor`, when
    /// given, replaces the shifted first point. Edges with fewer than three
    /// points produce nothing.
    pub fn predict_opposite_edge(
        &self,
        edge: &[Point],
        toward: Side,
        offset: f64,
        anchor: Option<Point>,
    ) -> Vec<Point> {
        if edge.len() < 3 {
            return Vec::new();
        }
        let dx = toward.direction() * offset;
        let start = match anchor {
            Some(a) => Some(a),
            None => self.shifted(edge[0], dx),
        };
        let mid = self.shifted(edge[edge.len() / 2], dx);
        let end = self.shifted(edge[edge.len() - 1], dx);

        match (start, mid, end) {
            (Some(s), Some(m), Some(e)) => bezier_clamped(self.params.curve_dt, &[s, m, e]),
            _ => {
                log::debug!("edge prediction left the mapped region");
                Vec::new()
            }
        }
    }
}

impl Default for PerspectiveMapping {
    fn default() -> Self {
        // The built-in quadrilateral is a non-degenerate trapezoid.
        let params = PerspectiveParams::default();
        let image_to_top = estimate_homography(
            &to_points(&params.image_points),
            &to_points(&params.top_points),
        )
        .unwrap_or_else(|| Homography::new(nalgebra::Matrix3::identity()));
        let top_to_image = image_to_top.inverse().unwrap_or(image_to_top);
        Self {
            params,
            image_to_top,
            top_to_image,
        }
    }
}
