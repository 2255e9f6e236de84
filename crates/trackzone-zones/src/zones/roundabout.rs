//! Roundabout entry, circulation and exit.
//!
//! All geometry is written for a ring that opens to the left. A ring that
//! opens to the right is handled by running the same logic on the mirrored
//! frame and mirroring the repaired edges back; the side is latched on the
//! first detection and held until the zone returns to idle.

use serde::{Deserialize, Serialize};
use trackzone_core::{bezier_clamped, GrayImageView, Point, Side, IMAGE_COLS, IMAGE_ROWS};

use crate::debounce::tick;
use crate::{TrackFrame, Zone, ZoneInput, ZoneKind};

const ROWS: i32 = IMAGE_ROWS;
const COLS: i32 = IMAGE_COLS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundaboutParams {
    /// Frames ignored after construction or reset.
    pub shield_frames: u32,
    /// Consecutive widening rows that open the ring.
    pub wide_rows: u32,
    /// Minimum track width of a widening row, as a fraction of the image width.
    pub wide_fraction: f64,
    /// Consecutive frames with both edges reacquired before leaving.
    pub exit_frames: u32,
    /// Border-hugging points an edge may carry and still count as reacquired.
    pub border_rows: usize,
}

impl Default for RoundaboutParams {
    fn default() -> Self {
        Self {
            shield_frames: 40,
            wide_rows: 5,
            wide_fraction: 0.6,
            exit_frames: 3,
            border_rows: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundaboutState {
    #[default]
    None,
    Entering,
    Inside,
    Exiting,
    Finish,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoundaboutZone {
    params: RoundaboutParams,
    state: RoundaboutState,
    side: Option<Side>,
    shield: u32,
    /// Edge index the entry repair hangs off.
    repair_row: usize,
    /// Consecutive frames without a branch point.
    spur_free: u32,
    /// Consecutive frames with both edges back.
    reacquired: u32,
}

/// Row of the first point accepted by `on_track`, else the last row.
fn breakpoint_row(edge: &[Point], on_track: impl Fn(i32) -> bool) -> i32 {
    let mut row = 0;
    for p in edge {
        row = p.row;
        if on_track(p.col) {
            break;
        }
    }
    row
}

fn slope_x100(a: Point, b: Point) -> i32 {
    if a.row == b.row {
        return 0;
    }
    (b.col - a.col) * 100 / (b.row - a.row)
}

/// Bend the right edge into the ring exit at `y_end` and cut the left edge
/// where it runs onto the image border.
fn repair_ring_entry(f: &mut TrackFrame, straight: usize, ringside: usize, y_end: i32, dt: f64) {
    if straight >= f.left.len() || straight >= f.right.len() {
        return;
    }
    let (l, r) = (f.left[straight], f.right[straight]);
    let mid = Point::new(l.row + (y_end - r.row) * 5 / 4, (l.col + r.col) / 2);
    let curve = bezier_clamped(dt, &[r, mid, Point::new(y_end, 0)]);
    f.left.truncate(ringside);
    f.right.truncate(straight);
    f.right.extend(curve);
}

impl RoundaboutZone {
    pub fn new(params: RoundaboutParams) -> Self {
        Self {
            params,
            state: RoundaboutState::None,
            side: None,
            shield: 0,
            repair_row: 0,
            spur_free: 0,
            reacquired: 0,
        }
    }

    #[inline]
    pub fn params(&self) -> &RoundaboutParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> RoundaboutState {
        self.state
    }

    /// Side the ring opens to, latched while the zone is engaged.
    #[inline]
    pub fn side(&self) -> Option<Side> {
        self.side
    }

    fn set_state(&mut self, next: RoundaboutState) {
        if self.state != next {
            log::debug!("roundabout: {:?} -> {:?} ({:?})", self.state, next, self.side);
            self.state = next;
        }
    }

    fn edges_reacquired(&self, f: &TrackFrame) -> bool {
        let on_border_left = f.left.iter().filter(|p| p.col <= 2).count();
        let on_border_right = f.right.iter().filter(|p| p.col >= COLS - 3).count();
        let (vl, vr) = (f.valid_rows_left as i64, f.valid_rows_right as i64);
        f.spurroad.is_empty()
            && f.both_longer_than(30)
            && (vr - vl).abs() < vr / 3
            && on_border_left < self.params.border_rows
            && on_border_right < self.params.border_rows
    }

    /// One frame of the left-opening state machine. `sample_col` is the
    /// column of the drivable-area mask on the ring side.
    fn step(&mut self, f: &mut TrackFrame, path: &GrayImageView<'_>, sample_col: i32) -> bool {
        if matches!(
            self.state,
            RoundaboutState::Inside | RoundaboutState::Exiting | RoundaboutState::Finish
        ) {
            if self.edges_reacquired(f) {
                if tick(&mut self.reacquired) >= self.params.exit_frames {
                    self.set_state(RoundaboutState::None);
                    self.repair_row = 0;
                    self.reacquired = 0;
                    self.spur_free = 0;
                    return false;
                }
            } else {
                self.reacquired = 0;
            }
        }

        let wlen = f.width_len();
        let last = wlen.saturating_sub(1);
        let mut enabled = false;
        let mut opening = false;
        let mut col_enter = 0;
        let mut ringside = last;
        let mut straightside = last;
        let mut y_end = last as i32;

        self.repair_row = self.repair_row.saturating_sub(5);
        if self.state == RoundaboutState::Entering && !f.spurroad.is_empty() && f.left.len() > 20 {
            let spur_row = f.spurroad[0].row;
            let lo = self.repair_row.saturating_sub(30).max(10);
            let hi = (f.left.len() - 10).min(self.repair_row + 30);
            for j in lo..hi {
                if f.left[j].row < spur_row {
                    break;
                }
                if f.left[j].col > f.left[j - 10].col && f.left[j].col > f.left[j + 10].col {
                    self.repair_row = j;
                    break;
                }
            }
        }

        let mut bp_left = breakpoint_row(&f.left, |c| c > 2);
        let bp_right = breakpoint_row(&f.right, |c| c < COLS - 3);

        let wide_min = (COLS as f64 * self.params.wide_fraction) as i32;
        let broken_left = f.stdev_left > 120.0 && f.stdev_right < 50.0;
        let mut count_wide = 0u32;
        for i in 1..wlen {
            let (w, w_prev) = (
                f.right[i].col - f.left[i].col,
                f.right[i - 1].col - f.left[i - 1].col,
            );
            if w > w_prev
                && w > wide_min
                && f.left[i].row > 30
                && (broken_left || self.state == RoundaboutState::Entering)
            {
                count_wide += 1;
            } else {
                count_wide = 0;
            }

            if matches!(self.state, RoundaboutState::None | RoundaboutState::Entering)
                && count_wide >= self.params.wide_rows
                && !f.spurroad.is_empty()
            {
                if !opening {
                    let before = f.left[i.saturating_sub(5)];
                    if !f.spurroad.iter().any(|s| s.row < before.row) {
                        count_wide = 0;
                        continue;
                    }
                    if f.left[i].col < before.col {
                        opening = true;
                        col_enter = before.col;
                        self.repair_row = i;
                    }
                }
                if opening && col_enter - f.left[i].col >= 3 {
                    enabled = true;
                    self.set_state(RoundaboutState::Entering);
                    if straightside == last {
                        straightside = i - count_wide as usize;
                    }
                } else {
                    count_wide = 0;
                }
            }

            if enabled && self.state == RoundaboutState::Entering {
                if f.left[i].col <= 2 && i != last {
                    if ringside == last {
                        ringside = i;
                    }
                    y_end = f.left[i].row;
                } else if ringside != last {
                    repair_ring_entry(f, straightside, ringside, y_end, 0.01);
                    break;
                }
            }
        }

        if !enabled && self.state == RoundaboutState::Entering {
            if !f.spurroad.is_empty() && self.repair_row + 1 < f.right.len() && bp_right > ROWS / 2 {
                straightside = self.repair_row;
                let n = f.left.len();
                if let Some(i) = (self.repair_row..n.saturating_sub(1))
                    .find(|&i| f.left[i].col <= 2 && i != last)
                {
                    ringside = i;
                }
                for i in ringside..n.saturating_sub(1) {
                    if f.left[i].col <= 2 && i != last {
                        y_end = f.left[i].row;
                    } else if ringside != last {
                        repair_ring_entry(f, straightside, ringside, y_end, 0.02);
                        break;
                    }
                }
            } else if let Some(&tail) = f.right.last().filter(|_| f.right.len() > 1) {
                let x_end = (tail.row..tail.row + 50)
                    .find(|&r| path.get(r, sample_col) > 0)
                    .unwrap_or(tail.row);
                let start = Point::new(ROWS - 10, COLS - 1);
                let end = Point::new(x_end, 0);
                f.left.clear();
                f.right = bezier_clamped(0.02, &[start, start.midpoint(end), end]);
            }
        }

        if self.state == RoundaboutState::Entering && f.spurroad.is_empty() && self.spur_free >= 3 {
            self.set_state(RoundaboutState::Inside);
        }

        if self.state == RoundaboutState::Inside {
            let n = f.right.len();
            let mut rbr = 0;
            for i in (0..n).step_by(3) {
                if f.right[i].col <= f.right[rbr].col {
                    rbr = i;
                } else if f.right[i].col - f.right[rbr].col > 5 {
                    break;
                }
            }
            f.left.clear();

            if n > 0 && f.right[rbr].col < COLS / 4 {
                f.right.truncate(rbr);
            } else if n > rbr + 20 {
                let bottom = slope_x100(f.right[0], f.right[rbr]);
                let top = slope_x100(f.right[rbr], f.right[rbr + 20]);
                if bottom * top <= 0 {
                    bp_left = f.right[f.valid_rows_left.min(n - 1)].row;
                    let anchor = f.right[rbr];
                    let mid = Point::new((anchor.row + bp_left) * 3 / 8, anchor.col / 2);
                    let curve = bezier_clamped(0.01, &[anchor, mid, Point::new(bp_left, 0)]);
                    f.right.truncate(rbr);
                    f.right.extend(curve);
                }
            } else {
                let start = Point::new(bp_right.max(ROWS - 80), COLS);
                let mid = Point::new((ROWS - 50 + bp_left) / 4, COLS / 2);
                f.right = bezier_clamped(0.01, &[start, mid, Point::new(bp_left, 0)]);
            }

            if bp_left.max(bp_right) < ROWS / 2 {
                self.set_state(RoundaboutState::Exiting);
            }
        } else if self.state == RoundaboutState::Exiting && bp_left < ROWS / 2 {
            let start = Point::new(ROWS - 50, COLS - 1);
            let mid = Point::new((ROWS - 50 + bp_left) * 3 / 8, COLS / 2);
            f.left.clear();
            f.right = bezier_clamped(0.01, &[start, mid, Point::new(bp_left, 0)]);
            if bp_right > ROWS / 2 {
                self.set_state(RoundaboutState::Finish);
            }
        }

        if f.spurroad.is_empty() {
            tick(&mut self.spur_free);
        } else {
            self.spur_free = 0;
        }

        self.state != RoundaboutState::None
    }
}

impl Default for RoundaboutZone {
    fn default() -> Self {
        Self::new(RoundaboutParams::default())
    }
}

impl Zone for RoundaboutZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Roundabout
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        if self.shield < self.params.shield_frames {
            self.shield += 1;
            return false;
        }

        let active = match self.side {
            Some(Side::Left) => self.step(frame, &input.path, 0),
            Some(Side::Right) => {
                let mut mirrored = frame.mirrored();
                let active = self.step(&mut mirrored, &input.path, COLS - 1);
                *frame = mirrored.mirrored();
                active
            }
            None => {
                let mut left = self.clone();
                let mut working = frame.clone();
                let active = left.step(&mut working, &input.path, 0);
                if left.state != RoundaboutState::None {
                    *self = left;
                    self.side = Some(Side::Left);
                    *frame = working;
                    log::info!("roundabout: opening to the left");
                    return active;
                }

                let mut right = self.clone();
                let mut mirrored = frame.mirrored();
                let active = right.step(&mut mirrored, &input.path, COLS - 1);
                if right.state != RoundaboutState::None {
                    *self = right;
                    self.side = Some(Side::Right);
                    *frame = mirrored.mirrored();
                    log::info!("roundabout: opening to the right");
                    return active;
                }

                *self = left;
                false
            }
        };

        if self.state == RoundaboutState::None {
            self.side = None;
        }
        active
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::testing::{input_with, straight_frame, Fixture};

    fn left_col(i: usize) -> i32 {
        match i {
            0..50 => 60,
            50..100 => (60 - (i as i32 - 49) * 2).max(0),
            _ => 40,
        }
    }

    /// Left edge bulging out to the image border with a branch point ahead.
    fn opening_frame(spur: bool) -> TrackFrame {
        let left = (0..200).map(|i| Point::new(239 - i as i32, left_col(i))).collect();
        let right = (0..200).map(|i| Point::new(239 - i as i32, 300)).collect();
        let mut f = TrackFrame::new(left, right);
        f.stdev_left = 200.0;
        f.stdev_right = 10.0;
        if spur {
            f.spurroad = vec![Point::new(150, 100)];
        }
        f
    }

    fn unshielded() -> RoundaboutZone {
        RoundaboutZone::new(RoundaboutParams {
            shield_frames: 0,
            ..RoundaboutParams::default()
        })
    }

    #[test]
    fn shield_suppresses_detection() {
        let fx = Fixture::default();
        let mut zone = RoundaboutZone::default();
        for _ in 0..40 {
            let mut f = opening_frame(true);
            assert!(!zone.detect(&mut f, &mut input_with(&fx, &[])));
            assert_eq!(zone.state(), RoundaboutState::None);
        }
        let mut f = opening_frame(true);
        assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone.side(), Some(Side::Left));
    }

    #[test]
    fn entry_bends_the_right_edge_into_the_ring() {
        let fx = Fixture::default();
        let mut zone = unshielded();
        let mut f = opening_frame(true);
        assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone.state(), RoundaboutState::Entering);
        // Left edge is cut where it runs onto the border, the right edge
        // keeps its straight part and then turns towards column 0.
        assert_eq!(f.left.len(), 78);
        assert_eq!(f.right[48], Point::new(191, 300));
        assert_eq!(f.right[49], Point::new(190, 300));
        let tail = f.right.last().copied().expect("curve");
        assert_eq!(tail, Point::new(140, 0));
        assert!(f.right.iter().all(|p| p.in_bounds()));
    }

    #[test]
    fn full_cycle_returns_to_idle() {
        let fx = Fixture::default();
        let mut zone = unshielded();

        let mut f = opening_frame(true);
        assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone.state(), RoundaboutState::Entering);

        for _ in 0..3 {
            let mut f = opening_frame(false);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
            assert_eq!(zone.state(), RoundaboutState::Entering);
        }
        let mut f = opening_frame(false);
        assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone.state(), RoundaboutState::Inside);
        assert!(f.left.is_empty());

        for _ in 0..2 {
            let mut f = straight_frame(60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
            assert_eq!(zone.state(), RoundaboutState::Inside);
        }
        let mut f = straight_frame(60, 260);
        assert!(!zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone.state(), RoundaboutState::None);
        assert_eq!(zone.side(), None);
    }

    #[test]
    fn right_opening_ring_is_handled_mirrored() {
        let fx = Fixture::default();
        let mut left_zone = unshielded();
        let mut right_zone = unshielded();

        let mut lf = opening_frame(true);
        let mut rf = opening_frame(true).mirrored();
        assert!(left_zone.detect(&mut lf, &mut input_with(&fx, &[])));
        assert!(right_zone.detect(&mut rf, &mut input_with(&fx, &[])));
        assert_eq!(right_zone.side(), Some(Side::Right));
        assert_eq!(rf, lf.mirrored());
    }

    #[test]
    fn reset_is_idempotent() {
        let fx = Fixture::default();
        let mut zone = unshielded();
        let mut f = opening_frame(true);
        zone.detect(&mut f, &mut input_with(&fx, &[]));
        zone.reset();
        let once = zone.clone();
        zone.reset();
        assert_eq!(zone, once);
        assert_eq!(zone, unshielded());
    }
}
