//! Garage: leaving it at the start and parking in it after the last lap.
//!
//! Two mutually exclusive heuristics drive the zone:
//!
//! * [`GarageHeuristic::CrosswalkGated`] exits to the left and only commits
//!   to the entry once the crosswalk marker has come close enough, i.e. its
//!   row passes `entry_distance * ROWS`.
//! * [`GarageHeuristic::MirroredAlternate`] exits to the right (the same
//!   repair run on the mirrored frame) and drives straight into the fixed
//!   parking path once the crosswalk is confirmed, without distance gating.

use serde::{Deserialize, Serialize};
use trackzone_core::{bezier_clamped, Point, IMAGE_COLS, IMAGE_ROWS};

use crate::debounce::tick;
use crate::detection::{first, Label};
use crate::{Detection, TrackFrame, Zone, ZoneInput, ZoneKind};

const ROWS: i32 = IMAGE_ROWS;
const COLS: i32 = IMAGE_COLS;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GarageHeuristic {
    #[default]
    CrosswalkGated,
    MirroredAlternate,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarageParams {
    pub heuristic: GarageHeuristic,
    /// Crosswalk row, as a fraction of the image height, past which the
    /// final parking manoeuvre starts.
    pub entry_distance: f64,
    /// Frames of settled edges that complete the exit.
    pub exit_frames: u32,
    /// Frames after the exit before lap-start detection is armed.
    pub arm_frames: u32,
}

impl Default for GarageParams {
    fn default() -> Self {
        Self {
            heuristic: GarageHeuristic::CrosswalkGated,
            entry_distance: 0.7,
            exit_frames: 5,
            arm_frames: 50,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GarageState {
    #[default]
    Exiting,
    EntryRecognition,
    EntryingA,
    EntryingB,
    Finish,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GarageZone {
    params: GarageParams,
    state: GarageState,
    entry_enabled: bool,
    slow_down: bool,
    exit_out: u32,
    entry_out: u32,
    enter_b: u32,
    hits: u32,
    session: u32,
    start_armed: bool,
    start_hits: u32,
    start_session: u32,
}

/// Index just below where the left edge runs onto the border (columns
/// under `border`), scanning from the far end.
fn break_left(left: &[Point], border: i32) -> usize {
    let mut counter = 0;
    let mut i = left.len().saturating_sub(1);
    while i > 50 {
        if left[i].col < border {
            counter += 1;
            if counter > 3 {
                return i + 3;
            }
        } else {
            counter = 0;
        }
        i -= 1;
    }
    left.len().saturating_sub(1)
}

/// Last point of the bottom-right run that leaves the right border.
fn break_right(right: &[Point]) -> usize {
    if right.len() < 3 || right[0].col < COLS - 20 {
        return 0;
    }
    let mut best = 0;
    let mut counter = 0;
    for i in 0..right.len().saturating_sub(50) {
        if right[i].col <= right[best].col && (right[i].col - right[best].col).abs() < 5 {
            best = i;
            counter = 0;
        } else {
            counter += 1;
            if counter > 3 {
                return best;
            }
        }
    }
    2
}

/// Median-column branch point, raised to the highest branch point within
/// 70 columns of it.
fn best_spur(spurs: &[Point]) -> Point {
    let mut cols: Vec<i32> = spurs.iter().map(|s| s.col).collect();
    cols.sort_unstable();
    let col = cols.get(cols.len() / 2).copied().unwrap_or(0);
    let row = spurs
        .iter()
        .filter(|s| (s.col - col).abs() < 70)
        .map(|s| s.row)
        .fold(ROWS, i32::min);
    Point::new(row, col)
}

/// Steer the right edge through the garage exit towards the branch point
/// and back onto the left edge.
fn repair_exit(f: &mut TrackFrame, border: i32, check_order: bool) {
    if f.left.len() <= 1 || f.right.len() <= 1 {
        return;
    }
    let rbl = break_left(&f.left, border);
    let rbr = break_right(&f.right);

    if f.right[rbr].row < ROWS / 2 {
        f.right.truncate(rbr);
        if rbl > rbr {
            f.left.truncate(rbl);
        }
        return;
    }
    if f.spurroad.len() <= 2 {
        return;
    }

    let rbl = rbl.min(f.width_len() - 1);
    let start = f.right[rbr];
    let spur = best_spur(&f.spurroad);
    if !check_order || (start.row > spur.row && start.col > spur.col) {
        let mid = Point::new(
            ((start.row + spur.row) as f64 * 0.4) as i32,
            (start.col + spur.col) / 2,
        );
        let back = f.left[rbl];
        let out = bezier_clamped(0.04, &[start, mid, spur]);
        let rejoin = bezier_clamped(0.02, &[spur, spur.midpoint(back), back]);
        f.right.truncate(rbr);
        f.right.extend(out);
        f.right.extend(rejoin);
    }
    f.left.truncate(rbl);
}

/// Fixed parking path: both edges converge onto the left border.
fn parking_path() -> TrackFrame {
    let end = Point::new(ROWS / 2, 1);
    let start_left = Point::new(ROWS - 10, 1);
    let start_right = Point::new(ROWS - 10, (COLS as f64 * 0.8) as i32);
    TrackFrame::new(
        bezier_clamped(0.02, &[start_left, start_left.midpoint(end), end]),
        bezier_clamped(0.02, &[start_right, start_right.midpoint(end), end]),
    )
}

impl GarageZone {
    pub fn new(params: GarageParams) -> Self {
        Self {
            params,
            state: GarageState::Exiting,
            entry_enabled: false,
            slow_down: false,
            exit_out: 0,
            entry_out: 0,
            enter_b: 0,
            hits: 0,
            session: 0,
            start_armed: false,
            start_hits: 0,
            start_session: 0,
        }
    }

    #[inline]
    pub fn params(&self) -> &GarageParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> GarageState {
        self.state
    }

    /// Allow parking; set once the configured laps are done.
    pub fn enable_entry(&mut self) {
        if !self.entry_enabled {
            log::info!("garage: entry enabled");
        }
        self.entry_enabled = true;
    }

    #[inline]
    pub fn entry_enabled(&self) -> bool {
        self.entry_enabled
    }

    /// Parking has completed and the vehicle should stop.
    #[inline]
    pub fn finished(&self) -> bool {
        self.state == GarageState::Finish
    }

    fn set_state(&mut self, next: GarageState) {
        if self.state != next {
            log::debug!("garage: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Lap-start check on the crosswalk at the start line.
    ///
    /// Arms `arm_frames` frames after the exit completed; once armed, more
    /// than five crosswalk frames inside a twelve-frame session report a
    /// crossing of the start line.
    pub fn starting_check(&mut self, detections: &[Detection]) -> bool {
        if self.start_armed {
            if first(detections, Label::Crosswalk).is_some() {
                tick(&mut self.start_hits);
            }
            if self.start_hits > 0 {
                tick(&mut self.start_session);
                if self.start_hits > 5 && self.start_session < 12 {
                    self.start_hits = 0;
                    self.start_session = 0;
                    return true;
                }
                if self.start_session > 12 {
                    self.start_hits = 0;
                    self.start_session = 0;
                }
            }
        } else if self.state != GarageState::Exiting
            && tick(&mut self.start_session) > self.params.arm_frames
        {
            self.start_session = 0;
            self.start_hits = 0;
            self.start_armed = true;
        }
        false
    }

    fn exit(&mut self, f: &mut TrackFrame) {
        if f.spurroad.len() < 3 || (f.stdev_left < 100.0 && f.stdev_right < 100.0) {
            if tick(&mut self.exit_out) >= self.params.exit_frames {
                self.set_state(GarageState::EntryRecognition);
            }
        } else {
            self.exit_out = 0;
        }

        match self.params.heuristic {
            GarageHeuristic::CrosswalkGated => repair_exit(f, 2, true),
            GarageHeuristic::MirroredAlternate => {
                let mut mirrored = f.mirrored();
                repair_exit(&mut mirrored, 29, false);
                *f = mirrored.mirrored();
            }
        }
    }

    fn entry(&mut self, f: &mut TrackFrame, detections: &[Detection]) {
        let crosswalk = first(detections, Label::Crosswalk)
            .map(Detection::center)
            .filter(|c| c.row > 0);

        if crosswalk.is_some() && f.stdev_right < 100.0 {
            tick(&mut self.hits);
        }
        if self.hits > 0 {
            tick(&mut self.session);
            if self.state == GarageState::EntryRecognition {
                if self.hits > 4 {
                    match self.params.heuristic {
                        GarageHeuristic::CrosswalkGated => self.set_state(GarageState::EntryingA),
                        GarageHeuristic::MirroredAlternate => {
                            self.enter_b = 0;
                            self.set_state(GarageState::EntryingB);
                            return;
                        }
                    }
                }
                if self.hits > 3 && crosswalk.is_some_and(|c| c.row > ROWS / 4) {
                    self.slow_down = true;
                }
            }
            if self.session > 8 {
                self.session = 0;
                self.hits = 0;
            }
        }

        match self.state {
            GarageState::EntryingA => {
                if (f.left.len() < 5 || f.right.len() < 5) && tick(&mut self.entry_out) > 5 {
                    self.set_state(GarageState::Finish);
                }
                if let Some(c) = crosswalk {
                    if c.row as f64 > ROWS as f64 * self.params.entry_distance {
                        if tick(&mut self.enter_b) > 2 {
                            self.enter_b = 0;
                            self.set_state(GarageState::EntryingB);
                        }
                    } else {
                        self.enter_b = 0;
                    }
                }
            }
            GarageState::EntryingB => {
                let path = parking_path();
                let path = match self.params.heuristic {
                    GarageHeuristic::CrosswalkGated => path,
                    GarageHeuristic::MirroredAlternate => path.mirrored(),
                };
                f.left = path.left;
                f.right = path.right;

                if tick(&mut self.enter_b) > 15 {
                    self.slow_down = true;
                    f.left.clear();
                    f.right.clear();
                    if self.enter_b > 20 {
                        log::info!("garage: parked");
                        self.set_state(GarageState::Finish);
                    }
                }
            }
            _ => {}
        }
    }
}

impl Default for GarageZone {
    fn default() -> Self {
        Self::new(GarageParams::default())
    }
}

impl Zone for GarageZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Garage
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        self.slow_down = false;
        if self.state == GarageState::Exiting {
            self.exit(frame);
        } else if self.entry_enabled {
            self.entry(frame, input.detections);
        }
        matches!(
            self.state,
            GarageState::Exiting
                | GarageState::EntryingA
                | GarageState::EntryingB
                | GarageState::Finish
        )
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }

    fn slow_down(&self) -> bool {
        self.slow_down
    }
}
