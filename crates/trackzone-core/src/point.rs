use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Number of rows in the camera frame the edge extractor works on.
pub const IMAGE_ROWS: i32 = 240;
/// Number of columns in the camera frame the edge extractor works on.
pub const IMAGE_COLS: i32 = 320;
/// Height of the bird's-eye frame.
pub const TOP_ROWS: i32 = 400;
/// Width of the bird's-eye frame.
pub const TOP_COLS: i32 = 320;

/// Integer image-space point.
///
/// Axis order is always `(row, col)`: `row` grows downwards from the top
/// image row, `col` grows rightwards from the left image column. The
/// conversion to `(x, y) = (col, row)` only happens at the homography
/// boundary via [`Point::to_xy`] / [`Point::from_xy`].
///
/// `slope` is a transient annotation some edge algorithms attach; it does
/// not participate in equality.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Point {
    pub row: i32,
    pub col: i32,
    #[serde(default)]
    pub slope: f32,
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.row == other.row && self.col == other.col
    }
}

impl Eq for Point {}

impl Point {
    #[inline]
    pub const fn new(row: i32, col: i32) -> Self {
        Self {
            row,
            col,
            slope: 0.0,
        }
    }

    /// Clamp into `[0, IMAGE_ROWS-1] x [0, IMAGE_COLS-1]`.
    #[inline]
    pub fn clamped(self) -> Self {
        Self {
            row: self.row.clamp(0, IMAGE_ROWS - 1),
            col: self.col.clamp(0, IMAGE_COLS - 1),
            slope: self.slope,
        }
    }

    /// Reflect across the vertical image axis.
    #[inline]
    pub fn mirrored(self) -> Self {
        Self {
            row: self.row,
            col: IMAGE_COLS - 1 - self.col,
            slope: -self.slope,
        }
    }

    /// Midpoint with integer truncation.
    #[inline]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.row + other.row) / 2, (self.col + other.col) / 2)
    }

    /// `(x, y) = (col, row)` for projective maths.
    #[inline]
    pub fn to_xy(self) -> Point2<f64> {
        Point2::new(self.col as f64, self.row as f64)
    }

    /// Inverse of [`Point::to_xy`], rounding to the nearest pixel.
    ///
    /// Non-finite input saturates to `0`, so the result is always a valid
    /// integer pair.
    #[inline]
    pub fn from_xy(p: Point2<f64>) -> Self {
        Self::new(p.y.round() as i32, p.x.round() as i32)
    }

    #[inline]
    pub fn in_bounds(self) -> bool {
        (0..IMAGE_ROWS).contains(&self.row) && (0..IMAGE_COLS).contains(&self.col)
    }
}

/// Lane side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    /// Sign of the bird's-eye x translation that moves a point towards this side.
    #[inline]
    pub fn direction(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

/// Clamp every point of an edge into image bounds.
pub fn clamp_edge(edge: &mut [Point]) {
    for p in edge.iter_mut() {
        *p = p.clamped();
    }
}

/// Reflect every point of an edge across the vertical image axis.
pub fn mirror_edge(edge: &mut [Point]) {
    for p in edge.iter_mut() {
        *p = p.mirrored();
    }
}
