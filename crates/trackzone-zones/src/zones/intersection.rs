//! Four-way intersection: oblique and straight approaches.
//!
//! The zone keeps no memory between frames; every frame is classified and
//! repaired on its own. An oblique approach from the right is the mirror
//! image of one from the left and is handled on the mirrored frame.

use serde::{Deserialize, Serialize};
use trackzone_core::{bezier_clamped, Point, IMAGE_COLS, IMAGE_ROWS};

use crate::frame::MirroredRetrace;
use crate::{TrackFrame, TrackRetrace, Zone, ZoneInput, ZoneKind};

const ROWS: i32 = IMAGE_ROWS;
const COLS: i32 = IMAGE_COLS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionParams {
    /// Slope spread of the intact edge above which an oblique approach is
    /// considered.
    pub oblique_stdev: f64,
    /// Full-width rows needed for a straight approach.
    pub straight_rows: u32,
}

impl Default for IntersectionParams {
    fn default() -> Self {
        Self {
            oblique_stdev: 50.0,
            straight_rows: 20,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Approach {
    #[default]
    None,
    ObliqueLeft,
    ObliqueRight,
    Straight,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntersectionZone {
    params: IntersectionParams,
    approach: Approach,
}

/// Left edge on the border while the track keeps widening.
fn oblique_from_left(f: &TrackFrame, min_stdev: f64) -> bool {
    if f.stdev_right <= min_stdev {
        return false;
    }
    let (mut hits, mut span) = (0u32, 0u32);
    for i in 2..f.width_len().saturating_sub(10) {
        let widening = f.right[i].col - f.left[i].col > f.right[i - 2].col - f.left[i - 2].col;
        if f.left[i].col < 2 && widening {
            hits += 1;
        }
        if hits > 0 {
            span += 1;
            if span > 8 {
                hits = 0;
                span = 0;
            }
            if hits > 5 {
                return true;
            }
        }
    }
    false
}

/// Index where the right edge, after leaving the border, starts bending
/// outwards again.
fn right_break_down(right: &[Point]) -> usize {
    let mut counter = 0;
    let mut started = false;
    for i in 0..right.len().saturating_sub(10) {
        if right[i].col < COLS - 1 {
            counter += 1;
        } else {
            counter = 0;
        }
        if counter > 2 {
            started = true;
            counter = 0;
        }
        if started {
            if right[i].col > right[i - 2].col {
                counter += 1;
            } else {
                counter = 0;
            }
            if counter > 2 {
                return i - 3;
            }
        }
    }
    0
}

/// Top of the straight left run below the crossing.
fn left_break_up(left: &[Point]) -> usize {
    let mut best = left.len().saturating_sub(5);
    let (mut counter, mut filtered) = (0, 0);
    let mut i = best;
    while i > 50 {
        if left[i].col > 2 && (left[i].col - left[i + 1].col).abs() < 3 {
            best = i;
            counter = 0;
            filtered += 1;
        } else if left[i].col <= 2 && filtered > 10 {
            counter += 1;
            if counter > 5 {
                return best;
            }
        }
        i -= 1;
    }
    best
}

/// Bottom corner of the left edge before it opens into the crossing.
fn left_break_down(left: &[Point]) -> usize {
    let mut best = 0;
    let mut counter = 0;
    for i in 0..left.len() / 2 {
        if left[i].col > left[best].col {
            best = i;
            counter = 0;
        } else {
            counter += 1;
            if counter > 5 {
                return best;
            }
        }
    }
    best
}

/// First index at or after `from` whose row reaches `row`, minus one.
fn row_end(edge: &[Point], from: usize, row: i32) -> usize {
    (from..edge.len())
        .find(|&i| edge[i].row <= row)
        .map_or(from, |i| i.saturating_sub(1))
}

/// Repair for a left-oblique approach; `false` when no corner was found.
fn repair_oblique(f: &mut TrackFrame, retrace: &mut dyn TrackRetrace) -> bool {
    let rd = right_break_down(&f.right);
    if rd == 0 || f.right[rd].col <= 20 {
        return false;
    }
    let corner = f.right[rd];

    let spur = f
        .spurroad
        .iter()
        .copied()
        .filter(|s| s.col < corner.col && s.row < corner.row)
        .min_by_key(|s| corner.row - s.row);
    if let Some(spur) = spur {
        let end_row = row_end(&f.right, rd, spur.row);
        let curve = bezier_clamped(0.04, &[corner, corner.midpoint(spur), spur]);
        f.right.truncate(rd);
        f.right.extend(curve);
        if spur.col > COLS / 8 {
            retrace.retrace_from(f, end_row);
        } else {
            f.left.truncate(end_row);
        }
        return true;
    }

    if corner.col >= COLS / 2 {
        return false;
    }
    let mut counter = 0;
    let mut lu = rd;
    for i in rd..f.left.len().saturating_sub(10) {
        if f.left[i].col > 1 {
            counter += 1;
        } else {
            counter = 0;
        }
        if counter > 2 {
            lu = i - 2;
            break;
        }
    }
    let mut end = Point::new(corner.row, 1);
    if lu < f.left.len() {
        end = Point::new((corner.row + f.left[lu].row) / 2, 1);
        f.left.truncate(lu);
    }
    let curve = bezier_clamped(0.05, &[corner, corner.midpoint(end), end]);
    f.right.truncate(rd);
    f.right.extend(curve);
    true
}

impl IntersectionZone {
    pub fn new(params: IntersectionParams) -> Self {
        Self {
            params,
            approach: Approach::None,
        }
    }

    #[inline]
    pub fn params(&self) -> &IntersectionParams {
        &self.params
    }

    /// Approach classified in the last frame.
    #[inline]
    pub fn approach(&self) -> Approach {
        self.approach
    }

    fn straight_ahead(&self, f: &TrackFrame) -> bool {
        if f.spurroad.is_empty() {
            return false;
        }
        let (mut full, mut span) = (0u32, 0u32);
        for i in 2..f.width_len().saturating_sub(10) {
            if f.right[i].col - f.left[i].col > COLS - 5 {
                full += 1;
            }
            if full > 0 {
                span += 1;
                if span > 30 {
                    full = 0;
                    span = 0;
                }
                if full > self.params.straight_rows {
                    return true;
                }
            }
        }
        false
    }

    fn repair_straight(f: &mut TrackFrame, retrace: &mut dyn TrackRetrace) -> bool {
        let mut repaired = false;
        let lu = left_break_up(&f.left);
        let ld = left_break_down(&f.left);
        let limit = (COLS / 2) as usize;
        if lu > ld && lu < limit && ld < limit && lu < f.left.len() {
            let (top, bottom) = (f.left[lu], f.left[ld]);
            if top.row != bottom.row {
                let k = (top.col - bottom.col) as f64 / (top.row - bottom.row) as f64;
                let b = top.col as f64 - k * top.row as f64;
                for p in &mut f.left[ld..=lu] {
                    p.col = ((k * p.row as f64 + b) as i32).clamp(0, COLS - 1);
                }
                repaired = true;
            }
        }

        let Some(spur) = f.spurroad.iter().copied().max_by_key(|s| s.row) else {
            return repaired;
        };
        if spur.col > COLS / 3 && !f.right.is_empty() {
            let end_row = row_end(&f.right, 10, spur.row);
            let start = f.right[0];
            f.right = bezier_clamped(0.04, &[start, start.midpoint(spur), spur]);
            retrace.retrace_from(f, end_row);
            repaired = true;
        }
        repaired
    }
}

impl Zone for IntersectionZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Intersection
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        self.approach = Approach::None;
        let half = (ROWS / 2) as usize;
        if frame.left.len() < half || frame.right.len() < half {
            return false;
        }

        let min_stdev = self.params.oblique_stdev;
        let mut repaired = false;
        if oblique_from_left(frame, min_stdev) {
            self.approach = Approach::ObliqueLeft;
            repaired = repair_oblique(frame, input.retrace);
        } else {
            let mut mirrored = frame.mirrored();
            if oblique_from_left(&mirrored, min_stdev) {
                self.approach = Approach::ObliqueRight;
                let mut retrace = MirroredRetrace(&mut *input.retrace);
                repaired = repair_oblique(&mut mirrored, &mut retrace);
                if repaired {
                    *frame = mirrored.mirrored();
                }
            }
        }

        if !repaired && self.straight_ahead(frame) {
            self.approach = Approach::Straight;
            repaired = Self::repair_straight(frame, input.retrace);
        }

        if repaired {
            log::debug!("intersection: {:?} approach repaired", self.approach);
        } else {
            self.approach = Approach::None;
        }
        repaired
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}
