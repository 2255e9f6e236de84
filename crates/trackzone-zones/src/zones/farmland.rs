//! Farmland: a field with the lane marked only by cones.
//!
//! Inside the field both edges are rebuilt every frame from two cone
//! chains grown greedily from the lowest cone on each side. The longer
//! chain becomes a Bezier edge; the opposite edge is predicted from it in
//! the bird's-eye frame.

use serde::{Deserialize, Serialize};
use trackzone_core::{bezier_clamped, distance, Point, Side, IMAGE_COLS, IMAGE_ROWS};

use crate::debounce::{tick, Debounce, DebounceParams};
use crate::detection::{centers, nearest_to_center, Label};
use crate::repair::keep_head;
use crate::{TrackFrame, Zone, ZoneInput, ZoneKind};

const ROWS: i32 = IMAGE_ROWS;
const COLS: i32 = IMAGE_COLS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmlandParams {
    pub trigger: DebounceParams,
    /// Fraction of each edge kept while approaching the field.
    pub approach_keep: f64,
}

impl Default for FarmlandParams {
    fn default() -> Self {
        Self {
            trigger: DebounceParams::new(5, 8),
            approach_keep: 0.7,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FarmlandState {
    #[default]
    None,
    Enable,
    Enter,
    Cruise,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FarmlandZone {
    params: FarmlandParams,
    state: FarmlandState,
    trigger: Debounce,
    rec: u32,
    session: u32,
    last: (Vec<Point>, Vec<Point>),
}

/// Index where the left edge starts stepping outwards in a sustained way,
/// `0` when it never does.
fn break_left(left: &[Point]) -> usize {
    if left.len() < 10 {
        return 0;
    }
    let (mut counter, mut outward) = (0u32, 0u32);
    for i in 0..left.len() - 1 {
        if left[i + 1].col > left[i].col {
            outward += 1;
        }
        if outward > 0 {
            counter += 1;
            if counter > 8 && outward > 4 {
                return i - 8;
            }
        }
        if counter > 8 {
            counter = 0;
            outward = 0;
        }
    }
    0
}

/// Lowest cone in each image half. When the two seeds are far apart in
/// both axes only the lower one is kept.
fn seeds(cones: &[Point]) -> (Vec<Point>, Vec<Point>) {
    let lowest = |keep: fn(&Point) -> bool| cones.iter().copied().filter(keep).max_by_key(|c| c.row);
    let left = lowest(|c| c.col < COLS / 2).unwrap_or(Point::new(0, 0));
    let right = lowest(|c| c.col > COLS / 2).unwrap_or(Point::new(0, 0));

    if (right.col - left.col).abs() > COLS / 3 && (right.row - left.row).abs() > ROWS / 3 {
        if left.row > right.row {
            return (vec![left], Vec::new());
        }
        if left.row < right.row {
            return (Vec::new(), vec![right]);
        }
    }
    (vec![left], vec![right])
}

/// Closest remaining cone that lies above `tip` and within a distance bound
/// that shrinks towards the image top.
fn next_link(tip: Point, pool: &[Point]) -> Option<usize> {
    let bound = tip.row as f64 / 1.1;
    pool.iter()
        .enumerate()
        .filter(|(_, c)| c.row < tip.row && distance(tip, **c) < bound)
        .min_by(|(_, a), (_, b)| distance(tip, **a).total_cmp(&distance(tip, **b)))
        .map(|(i, _)| i)
}

/// Extend both chains one cone at a time, alternating sides, until neither
/// finds a successor.
fn grow_chains(left: &mut Vec<Point>, right: &mut Vec<Point>, cones: &[Point]) {
    if left.is_empty() && right.is_empty() {
        return;
    }
    let mut pool = cones.to_vec();
    while !pool.is_empty() {
        let mut grown = false;
        for chain in [&mut *left, &mut *right] {
            let Some(&tip) = chain.last() else {
                continue;
            };
            if let Some(i) = next_link(tip, &pool) {
                chain.push(pool.swap_remove(i));
                grown = true;
            }
        }
        if !grown {
            break;
        }
    }
}

fn smooth(chain: &[Point]) -> Vec<Point> {
    bezier_clamped(
        0.05,
        &[chain[0], chain[chain.len() / 2], chain[chain.len() - 1]],
    )
}

impl FarmlandZone {
    pub fn new(params: FarmlandParams) -> Self {
        Self {
            params,
            state: FarmlandState::None,
            trigger: Debounce::default(),
            rec: 0,
            session: 0,
            last: (Vec::new(), Vec::new()),
        }
    }

    #[inline]
    pub fn params(&self) -> &FarmlandParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> FarmlandState {
        self.state
    }

    fn set_state(&mut self, next: FarmlandState) {
        log::debug!("farmland: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.rec = 0;
        self.session = 0;
    }

    /// Rebuild both edges from the cone chains; falls back to the previous
    /// frame's edges when neither chain has two cones.
    ///
    /// A lone cone on the short side anchors the predicted edge once it lies
    /// below `left_anchor_row` (left side) or `ROWS / 3` (right side).
    fn rebuild(
        &mut self,
        f: &mut TrackFrame,
        mut left: Vec<Point>,
        mut right: Vec<Point>,
        left_anchor_row: i32,
        input: &ZoneInput<'_>,
    ) {
        let cones = centers(input.detections, Label::Cone);
        grow_chains(&mut left, &mut right, &cones);

        let mapping = input.mapping;
        let default_offset = mapping.params().lane_offset;
        let third = ROWS / 3;
        let chains = if left.len() >= right.len() && left.len() >= 2 {
            let smoothed = smooth(&left);
            let predicted = match right.first() {
                Some(&r) if r.row > third => {
                    let offset = mapping.lane_offset(left[0], r);
                    mapping.predict_opposite_edge(&smoothed, Side::Right, offset, Some(r))
                }
                _ => mapping.predict_opposite_edge(&smoothed, Side::Right, default_offset, None),
            };
            Some((smoothed, predicted))
        } else if left.len() < right.len() && right.len() >= 2 {
            let smoothed = smooth(&right);
            let predicted = match left.first() {
                Some(&l) if l.row > left_anchor_row => {
                    let offset = mapping.lane_offset(l, right[0]);
                    mapping.predict_opposite_edge(&smoothed, Side::Left, offset, Some(l))
                }
                _ => mapping.predict_opposite_edge(&smoothed, Side::Left, default_offset, None),
            };
            Some((predicted, smoothed))
        } else {
            None
        };

        match chains {
            Some((l, r)) => {
                f.left.extend(l);
                f.right.extend(r);
            }
            None => {
                f.left = self.last.0.clone();
                f.right = self.last.1.clone();
            }
        }
        self.last = (f.left.clone(), f.right.clone());
    }

    fn enter(&mut self, f: &mut TrackFrame, input: &ZoneInput<'_>) {
        if f.both_shorter_than(30) && tick(&mut self.rec) > 4 {
            self.set_state(FarmlandState::Cruise);
        }
        let brk = break_left(&f.left);
        let (left, right) = if brk > 0 {
            let seed_left = f.left[brk];
            f.left.truncate(brk);
            let seed_right = f.right.last().copied();
            (vec![seed_left], seed_right.into_iter().collect())
        } else {
            seeds(&centers(input.detections, Label::Cone))
        };
        self.rebuild(f, left, right, ROWS / 3, input);
    }

    fn cruise(&mut self, f: &mut TrackFrame, input: &ZoneInput<'_>) {
        if f.both_longer_than(50) {
            tick(&mut self.rec);
        }
        if self.rec > 0 {
            tick(&mut self.session);
            if self.rec > 3 && self.session < 6 {
                log::info!("farmland: field cleared");
                self.set_state(FarmlandState::None);
                self.last = (Vec::new(), Vec::new());
                return;
            }
        }
        if self.session > 8 {
            self.rec = 0;
            self.session = 0;
        }
        let (left, right) = seeds(&centers(input.detections, Label::Cone));
        self.rebuild(f, left, right, ROWS / 2, input);
    }
}

impl Default for FarmlandZone {
    fn default() -> Self {
        Self::new(FarmlandParams::default())
    }
}

impl Zone for FarmlandZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Farmland
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        match self.state {
            FarmlandState::None => {
                let corn = nearest_to_center(input.detections, Label::Corn).is_some();
                if self.trigger.update(corn, self.params.trigger) {
                    log::info!("farmland: corn confirmed");
                    self.set_state(FarmlandState::Enable);
                }
                self.last = (frame.left.clone(), frame.right.clone());
            }
            FarmlandState::Enable => {
                let half = (ROWS / 2) as usize;
                if frame.both_shorter_than(half) {
                    if tick(&mut self.rec) > 2 {
                        self.set_state(FarmlandState::Enter);
                    }
                } else {
                    keep_head(&mut frame.left, self.params.approach_keep, 50);
                    keep_head(&mut frame.right, self.params.approach_keep, 50);
                }
            }
            FarmlandState::Enter => self.enter(frame, input),
            FarmlandState::Cruise => self.cruise(frame, input),
        }
        self.state != FarmlandState::None
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}
