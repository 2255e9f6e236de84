//! Silo: cone-course detour announced by the granary marker.
//!
//! The course is entered to the right, cruised along the left cone row and
//! left through one of two exits. The second exit is taken when several
//! markers were seen at once on the way in.

use serde::{Deserialize, Serialize};
use trackzone_core::{bezier_clamped, Point, Side, IMAGE_COLS, IMAGE_ROWS};

use crate::debounce::{tick, Debounce, DebounceParams};
use crate::detection::{centers, Label};
use crate::repair::{at_fraction, lowest_cone_near_line, PathHistory};
use crate::{TrackFrame, Zone, ZoneInput, ZoneKind};

const ROWS: i32 = IMAGE_ROWS;
const COLS: i32 = IMAGE_COLS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiloParams {
    pub trigger: DebounceParams,
    /// Bird's-eye lane width used while cruising along the cone row.
    pub cruise_offset: f64,
    /// Recorded frames kept for the exit replay.
    pub history: usize,
    /// Frames spent in Enable without an entry cone before giving up.
    pub give_up_frames: u32,
}

impl Default for SiloParams {
    fn default() -> Self {
        Self {
            trigger: DebounceParams::new(2, 8),
            cruise_offset: 180.0,
            history: 300,
            give_up_frames: 60,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiloState {
    #[default]
    None,
    Enable,
    Enter,
    Cruise,
    Exit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SiloZone {
    params: SiloParams,
    state: SiloState,
    trigger: Debounce,
    rec: u32,
    session: u32,
    stalled: u32,
    multi_markers: u32,
    exit_two: bool,
    slow_down: bool,
    last: (Vec<Point>, Vec<Point>),
    history: PathHistory,
}

/// Nearest cone to the lower half of the left edge.
fn cone_on_left_line(left: &[Point], cones: &[Point]) -> Option<Point> {
    if left.len() < 10 {
        return None;
    }
    let a = at_fraction(left, 0.25)?;
    let b = at_fraction(left, 0.5)?;
    lowest_cone_near_line(cones, a, b, 50.0)
}

/// Lowest cone in the right half.
fn right_down(cones: &[Point]) -> Option<Point> {
    cones
        .iter()
        .copied()
        .filter(|c| c.col > COLS / 2)
        .max_by_key(|c| c.row)
}

/// Rightmost cone clear of the bottom rows.
fn right_up(cones: &[Point]) -> Option<Point> {
    cones
        .iter()
        .copied()
        .filter(|c| c.col > 0 && (c.row as f64) < ROWS as f64 * 0.8)
        .max_by_key(|c| c.col)
}

/// Entry curve swinging from the bottom right through `cone` to the top
/// edge; the left edge runs along the image border.
fn entry_path(f: &mut TrackFrame, cone: Point) {
    let start = Point::new((cone.row + ROWS) / 2, (cone.col + COLS) / 2);
    let b = if cone.row == start.row {
        cone.col as f64
    } else {
        let k = (cone.col - start.col) as f64 / (cone.row - start.row) as f64;
        cone.col as f64 - k * cone.row as f64
    };
    let end = Point::new(0, b.clamp(0.0, (COLS - 1) as f64) as i32);
    f.right = bezier_clamped(0.02, &[start, cone, end]);
    f.left = f.right.iter().map(|p| Point::new(p.row, 0)).collect();
}

impl SiloZone {
    pub fn new(params: SiloParams) -> Self {
        Self {
            params,
            state: SiloState::None,
            trigger: Debounce::default(),
            rec: 0,
            session: 0,
            stalled: 0,
            multi_markers: 0,
            exit_two: false,
            slow_down: false,
            last: (Vec::new(), Vec::new()),
            history: PathHistory::new(params.history),
        }
    }

    #[inline]
    pub fn params(&self) -> &SiloParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> SiloState {
        self.state
    }

    /// The second exit was selected on entry.
    #[inline]
    pub fn exit_two(&self) -> bool {
        self.exit_two
    }

    fn set_state(&mut self, next: SiloState) {
        log::debug!("silo: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.rec = 0;
        self.session = 0;
        self.stalled = 0;
    }

    fn enter(&mut self, f: &mut TrackFrame, cones: &[Point]) {
        if f.left.len() > (ROWS / 2) as usize {
            if let Some(cone) = cone_on_left_line(&f.left, cones) {
                entry_path(f, cone);
            }
        } else {
            let cone = right_down(cones);
            let arrived = cone.is_some_and(|c| c.row > ROWS / 3 && c.col > COLS - 80);
            if (arrived || tick(&mut self.session) > 20) && tick(&mut self.rec) >= 2 {
                self.set_state(SiloState::Cruise);
            }
            if let Some(cone) = cone {
                entry_path(f, cone);
            }
        }
        self.history.push(&f.left, &f.right);
    }

    fn cruise(&mut self, f: &mut TrackFrame, cones: &[Point], input: &ZoneInput<'_>) {
        let sixth = (ROWS / 6) as usize;
        if f.both_longer_than(sixth) {
            self.slow_down = true;
            if tick(&mut self.rec) >= 2 {
                self.set_state(SiloState::Exit);
            }
        } else {
            self.rec = 0;
        }

        let left_cones: Vec<Point> = cones.iter().copied().filter(|c| c.col < COLS / 2).collect();
        let offset = self.params.cruise_offset;
        if left_cones.len() >= 2 {
            let lo = left_cones.iter().copied().max_by_key(|c| c.row);
            let hi = left_cones.iter().copied().min_by_key(|c| c.row);
            if let (Some(lo), Some(hi)) = (lo, hi) {
                if lo.row != hi.row {
                    let k = (lo.col - hi.col) as f64 / (lo.row - hi.row) as f64;
                    let b = lo.col as f64 - k * lo.row as f64;
                    if k != 0.0 && b != 0.0 {
                        let start = Point::new((-b / k) as i32, 0);
                        let end = Point::new(0, b as i32);
                        let line = bezier_clamped(0.02, &[start, start.midpoint(end), end]);
                        f.right = input
                            .mapping
                            .predict_opposite_edge(&line, Side::Right, offset, None);
                        f.left = if line.len() > 10 {
                            line[line.len() / 5..].to_vec()
                        } else {
                            line
                        };
                        self.last.0 = f.left.clone();
                    }
                }
            }
        } else if cones.len() > 3 {
            f.left = self.last.0.clone();
            f.right = input
                .mapping
                .predict_opposite_edge(&f.left, Side::Right, offset, None);
        }

        if self.state == SiloState::Cruise && !self.exit_two {
            let session = tick(&mut self.session);
            let passed = right_down(cones).map_or(true, |c| c.row < ROWS / 2);
            if (passed && session > 12) || session > 30 {
                self.set_state(SiloState::Exit);
            }
        }
        self.history.push(&f.left, &f.right);
    }

    fn exit(&mut self, f: &mut TrackFrame, cones: &[Point]) {
        let quarter = (ROWS / 4) as usize;
        if f.both_longer_than(quarter) && cones.len() < 3 {
            log::info!("silo: course cleared");
            self.reset();
            return;
        }
        if let Some(cone) = right_up(cones) {
            let p1 = Point::new(ROWS - 10, cone.col / 2);
            let p2 = Point::new((cone.row + ROWS) / 2, cone.col / 2);
            let p4 = Point::new(cone.row / 2, (cone.col + COLS) / 2);
            f.left = bezier_clamped(0.02, &[p1, p2, cone, p4]);
            f.right = f.left.iter().map(|p| Point::new(p.row, COLS - 1)).collect();
            self.last = (f.left.clone(), f.right.clone());
        } else if let Some((left, right)) = self.history.pop() {
            f.left = left;
            f.right = right;
        } else {
            f.left = self.last.0.clone();
            f.right = self.last.1.clone();
        }
    }
}

impl Default for SiloZone {
    fn default() -> Self {
        Self::new(SiloParams::default())
    }
}

impl Zone for SiloZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Silo
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        self.slow_down = false;
        let markers = centers(input.detections, Label::Granary);
        let cones = centers(input.detections, Label::Cone);

        match self.state {
            SiloState::None => {
                if markers.len() > 1 {
                    tick(&mut self.multi_markers);
                }
                if self.trigger.update(!markers.is_empty(), self.params.trigger) {
                    log::info!("silo: marker confirmed");
                    self.exit_two = false;
                    self.set_state(SiloState::Enable);
                }
            }
            SiloState::Enable => {
                if tick(&mut self.stalled) > self.params.give_up_frames {
                    log::debug!("silo: entry not found, giving up");
                    self.reset();
                    return false;
                }
                if markers.len() > 1 {
                    tick(&mut self.multi_markers);
                }
                if markers.is_empty() {
                    match cone_on_left_line(&frame.left, &cones) {
                        Some(c) if c.row as f64 > ROWS as f64 * 0.12 => {
                            if tick(&mut self.rec) >= 2 {
                                self.exit_two = self.multi_markers > 3;
                                self.set_state(SiloState::Enter);
                            }
                        }
                        Some(c) if (c.row as f64) < ROWS as f64 * 0.4 => self.slow_down = true,
                        _ => {}
                    }
                }
            }
            SiloState::Enter => self.enter(frame, &cones),
            SiloState::Cruise => self.cruise(frame, &cones, input),
            SiloState::Exit => self.exit(frame, &cones),
        }
        self.state != SiloState::None
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }

    fn slow_down(&self) -> bool {
        self.slow_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::testing::{det_at, edges_frame, input_with, straight_frame, Fixture};

    #[test]
    fn entry_path_runs_along_the_left_border() {
        let mut f = straight_frame(60, 260);
        entry_path(&mut f, Point::new(160, 200));
        assert_eq!(f.right[0], Point::new(200, 260));
        assert_eq!(f.right.last().map(|p| p.row), Some(0));
        assert!(f.left.iter().all(|p| p.col == 0));
        assert_eq!(f.left.len(), f.right.len());
    }

    #[test]
    fn two_markers_enable_the_zone() {
        let fx = Fixture::default();
        let mut zone = SiloZone::default();
        let marker = [det_at(Label::Granary, 60, 200)];
        let mut f = straight_frame(60, 260);
        assert!(!zone.detect(&mut f, &mut input_with(&fx, &marker)));
        assert!(zone.detect(&mut f, &mut input_with(&fx, &marker)));
        assert_eq!(zone.state(), SiloState::Enable);
        assert!(!zone.exit_two());
    }

    #[test]
    fn enable_gives_up_without_an_entry_cone() {
        let fx = Fixture::default();
        let mut zone = SiloZone::default();
        let marker = [det_at(Label::Granary, 60, 200)];
        for _ in 0..2 {
            let mut f = straight_frame(60, 260);
            zone.detect(&mut f, &mut input_with(&fx, &marker));
        }
        assert_eq!(zone.state(), SiloState::Enable);

        for _ in 0..60 {
            let mut f = straight_frame(60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        }
        let mut f = straight_frame(60, 260);
        assert!(!zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone, SiloZone::default());

        for _ in 0..100 {
            let mut f = straight_frame(60, 260);
            assert!(!zone.detect(&mut f, &mut input_with(&fx, &[])));
        }
    }

    #[test]
    fn cone_course_round_trip() {
        let fx = Fixture::default();
        let mut zone = SiloZone::default();
        let marker = [det_at(Label::Granary, 60, 200)];
        for _ in 0..2 {
            let mut f = straight_frame(60, 260);
            zone.detect(&mut f, &mut input_with(&fx, &marker));
        }
        assert_eq!(zone.state(), SiloState::Enable);

        let cone = [det_at(Label::Cone, 100, 62)];
        for _ in 0..2 {
            let mut f = straight_frame(60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &cone)));
        }
        assert_eq!(zone.state(), SiloState::Enter);
        assert!(!zone.exit_two());

        let bay = [det_at(Label::Cone, 120, 280)];
        for _ in 0..2 {
            let mut f = edges_frame(30, 60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &bay)));
            assert!(f.left.iter().all(|p| p.col == 0));
        }
        assert_eq!(zone.state(), SiloState::Cruise);

        let row = [det_at(Label::Cone, 200, 40), det_at(Label::Cone, 100, 100)];
        for _ in 0..13 {
            let mut f = edges_frame(30, 60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &row)));
        }
        assert_eq!(zone.state(), SiloState::Exit);

        let mut f = straight_frame(60, 260);
        assert!(!zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone, SiloZone::default());
    }
}
