//! Steering centerline derived from the repaired edge pair.

use serde::{Deserialize, Serialize};
use trackzone_core::{
    bezier_clamped, column_variance, edge_slope_stdev, mirror_edge, Point, IMAGE_COLS, IMAGE_ROWS,
};

use crate::TrackFrame;

const ROWS: i32 = IMAGE_ROWS;
const COLS: i32 = IMAGE_COLS;

/// Centerline spread reported when too few points are available to judge.
pub const SIGMA_UNKNOWN: f64 = 1000.0;

/// Shape class of the visible track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStyle {
    #[default]
    Straight,
    /// Only the right edge is usable; the track bends left.
    Left,
    /// Only the left edge is usable; the track bends right.
    Right,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Centerline {
    pub points: Vec<Point>,
    /// Row-weighted mean column of `points`, in `[0, COLS]`.
    pub control_center: i32,
    /// Column variance over the middle three fifths of `points`.
    pub sigma: f64,
    pub style: TrackStyle,
}

impl Default for Centerline {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            control_center: COLS / 2,
            sigma: SIGMA_UNKNOWN,
            style: TrackStyle::Straight,
        }
    }
}

fn break_left_down(left: &[Point]) -> usize {
    let mut counter = 0;
    for i in 0..left.len().saturating_sub(10) {
        if left[i].col >= 2 {
            counter += 1;
            if counter > 3 {
                return i - 2;
            }
        } else {
            counter = 0;
        }
    }
    0
}

fn break_right_down(right: &[Point]) -> usize {
    let mut counter = 0;
    for i in 0..right.len().saturating_sub(10) {
        if right[i].col < COLS - 2 {
            counter += 1;
            if counter > 3 {
                return i - 2;
            }
        } else {
            counter = 0;
        }
    }
    0
}

/// Cut `edge` before the first run of three border points from `from` on.
fn cut_at_border(edge: &mut Vec<Point>, from: usize, on_border: impl Fn(&Point) -> bool) {
    let mut counter = 0;
    for i in from..edge.len() {
        if on_border(&edge[i]) {
            counter += 1;
            if counter >= 3 {
                edge.truncate(i - 3);
                return;
            }
        } else {
            counter = 0;
        }
    }
}

/// Number of leading rows of each edge that are off the image border.
///
/// On a one-sided curve the inner edge is first cut where it runs onto the
/// border above the outer edge's departure from it.
pub fn valid_rows(left: &[Point], right: &[Point]) -> (usize, usize) {
    let mut left = left.to_vec();
    let mut right = right.to_vec();

    if left.len() > 10 && right.len() > 10 {
        let bl = break_left_down(&left) as i64;
        let br = break_right_down(&right) as i64;
        let right_end = right[right.len() - 1].col;
        let left_end = left[left.len() - 1].col;
        if right_end < COLS / 2 && br - bl > 5 {
            cut_at_border(&mut left, br as usize, |p| p.col < 1);
        } else if left_end > COLS / 2 && bl - br > 5 {
            cut_at_border(&mut right, bl as usize, |p| p.col > COLS - 2);
        }
    }

    let mut rows_left = 0;
    for i in (1..left.len()).rev() {
        let (cur, prev) = (left[i].col, left[i - 1].col);
        if prev >= 2 && cur != 2 {
            rows_left = i + 1;
            break;
        }
    }
    let mut rows_right = 0;
    for i in (1..right.len()).rev() {
        let (cur, prev) = (right[i].col, right[i - 1].col);
        if (cur <= COLS - 2 && prev <= COLS - 2) || (cur >= COLS - 2 && prev < COLS - 2) {
            rows_right = i + 1;
            break;
        }
    }
    (rows_left, rows_right)
}

/// Half-width offset walk along a single left edge.
fn walk_from_left(edge: &[Point]) -> Vec<Point> {
    const STEP: usize = 4;
    let half = COLS / 2;

    let mut start = 0;
    let mut counter = 0;
    for (i, p) in edge.iter().enumerate() {
        if p.col > 1 {
            counter += 1;
            if counter > 2 {
                start = i - 2;
                break;
            }
        } else {
            counter = 0;
        }
    }

    let lift = edge[start].row - edge[0].row;
    let mut out = Vec::new();
    let mut overflow = 0;
    for p in edge[start..].iter().step_by(STEP) {
        let col = p.col + half;
        if col > COLS - 1 {
            overflow += 1;
            if overflow > 2 {
                break;
            }
        } else {
            overflow = 0;
            out.push(Point::new(p.row - lift, col));
        }
    }
    out
}

fn midpoint_at(left: &[Point], right: &[Point], num: usize, den: usize) -> Point {
    let l = left[(left.len() * num / den).min(left.len() - 1)];
    let r = right[(right.len() * num / den).min(right.len() - 1)];
    l.midpoint(r)
}

/// Recompute the edge statistics, trim border rows on one-sided curves and
/// derive the steering centerline.
pub fn compute(frame: &mut TrackFrame) -> Centerline {
    frame.stdev_left = edge_slope_stdev(&frame.left, ROWS);
    frame.stdev_right = edge_slope_stdev(&frame.right, ROWS);

    let (sl, sr) = (frame.stdev_left, frame.stdev_right);
    if (sl < 80.0 && sr > 50.0) || (sl > 60.0 && sr < 50.0) {
        let (rows_left, rows_right) = valid_rows(&frame.left, &frame.right);
        frame.valid_rows_left = rows_left;
        frame.valid_rows_right = rows_right;
        frame.left.truncate(rows_left);
        frame.right.truncate(rows_right);
    }

    let (left, right) = (&frame.left, &frame.right);
    let bottom_gap = match (left.first(), right.first()) {
        (Some(l), Some(r)) => l.row - r.row,
        _ => 0,
    };

    let (points, style) = if left.len() > 4 && right.len() > 4 {
        let control = [
            midpoint_at(left, right, 0, 1),
            midpoint_at(left, right, 1, 3),
            midpoint_at(left, right, 2, 3),
            midpoint_at(left, right, 1, 1),
        ];
        (bezier_clamped(0.03, &control), TrackStyle::Straight)
    } else if !left.is_empty() && (right.len() <= 4 || bottom_gap > ROWS / 2) {
        (walk_from_left(left), TrackStyle::Right)
    } else if !right.is_empty() && (left.len() <= 4 || -bottom_gap > ROWS / 2) {
        let mut mirrored = right.clone();
        mirror_edge(&mut mirrored);
        let mut walk = walk_from_left(&mirrored);
        mirror_edge(&mut walk);
        (walk, TrackStyle::Left)
    } else {
        (Vec::new(), TrackStyle::Straight)
    };

    let (mut weighted, mut total) = (i64::from(COLS / 2), 1i64);
    for p in &points {
        let w = if p.row < ROWS / 2 { ROWS / 2 } else { ROWS - p.row };
        weighted += i64::from(p.col) * i64::from(w);
        total += i64::from(w);
    }
    let control_center = (weighted / total).clamp(0, i64::from(COLS)) as i32;

    let sigma = if points.len() > 20 {
        let trim = points.len() / 5;
        column_variance(&points[trim..points.len() - trim])
    } else {
        SIGMA_UNKNOWN
    };

    Centerline {
        points,
        control_center,
        sigma,
        style,
    }
}
