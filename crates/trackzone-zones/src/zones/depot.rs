//! Depot: a cone-lined service bay entered to the right, a timed stop, and
//! a reverse replay of the recorded entry path.

use serde::{Deserialize, Serialize};
use trackzone_core::{bezier_clamped, Point, Side, IMAGE_COLS, IMAGE_ROWS};

use crate::debounce::{tick, Debounce, DebounceParams};
use crate::detection::{centers, contains, Label};
use crate::repair::{at_fraction, highest, lowest_cone_near_line, PathHistory};
use crate::{TrackFrame, Zone, ZoneInput, ZoneKind};

const ROWS: i32 = IMAGE_ROWS;
const COLS: i32 = IMAGE_COLS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotParams {
    pub trigger: DebounceParams,
    /// Frames ignored after construction or reset before the marker counts.
    pub immunity_frames: u32,
    /// Frames the vehicle stands still inside the bay.
    pub stop_frames: u32,
    /// Recorded entry frames kept for the reverse replay.
    pub history: usize,
}

impl Default for DepotParams {
    fn default() -> Self {
        Self {
            trigger: DebounceParams::new(4, 8),
            immunity_frames: 20,
            stop_frames: 40,
            history: 300,
        }
    }
}

/// Depot phase; the index doubles as the motor-sign selector downstream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepotPhase {
    #[default]
    None,
    Enable,
    Enter,
    Cruise,
    Stop,
    Exit,
}

impl DepotPhase {
    #[inline]
    pub fn index(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Enable => 1,
            Self::Enter => 2,
            Self::Cruise => 3,
            Self::Stop => 4,
            Self::Exit => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DepotZone {
    params: DepotParams,
    phase: DepotPhase,
    trigger: Debounce,
    immunity: u32,
    rec: u32,
    exit: u32,
    stopping: bool,
    last: (Vec<Point>, Vec<Point>),
    history: PathHistory,
}

impl DepotZone {
    pub fn new(params: DepotParams) -> Self {
        Self {
            params,
            phase: DepotPhase::None,
            trigger: Debounce::default(),
            immunity: 0,
            rec: 0,
            exit: 0,
            stopping: false,
            last: (Vec::new(), Vec::new()),
            history: PathHistory::new(params.history),
        }
    }

    #[inline]
    pub fn params(&self) -> &DepotParams {
        &self.params
    }

    #[inline]
    pub fn phase(&self) -> DepotPhase {
        self.phase
    }

    /// The vehicle is held still inside the bay.
    #[inline]
    pub fn stopping(&self) -> bool {
        self.stopping
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn set_phase(&mut self, next: DepotPhase) {
        log::debug!("depot: {:?} -> {:?}", self.phase, next);
        self.phase = next;
        self.rec = 0;
        self.exit = 0;
    }

    fn record(&mut self, f: &TrackFrame) {
        self.last = (f.left.clone(), f.right.clone());
        self.history.push(&f.left, &f.right);
    }

    fn restore_last(&self, f: &mut TrackFrame) {
        f.left = self.last.0.clone();
        f.right = self.last.1.clone();
    }

    fn cruise(&mut self, f: &mut TrackFrame, input: &ZoneInput<'_>) {
        let half = (ROWS / 2) as usize;
        if f.both_longer_than(half) && tick(&mut self.exit) > 30 {
            self.set_phase(DepotPhase::Stop);
        }

        let cones = centers(input.detections, Label::Cone);
        let Some(top) = highest(&cones) else {
            self.restore_last(f);
            self.record(f);
            return;
        };

        if top.col >= COLS / 3 {
            let mut inner: Vec<Point> = cones.iter().copied().filter(|c| c.col <= top.col).collect();
            inner.sort_by_key(|c| c.col);
            if inner.len() >= 2 {
                let (first, last) = (inner[0], inner[inner.len() - 1]);
                let mid = if inner.len() >= 3 {
                    inner[inner.len() / 2]
                } else {
                    first.midpoint(last)
                };
                f.left = bezier_clamped(0.05, &[first, mid, last]);
                let offset = input.mapping.params().lane_offset;
                f.right = input
                    .mapping
                    .predict_opposite_edge(&f.left, Side::Right, offset, None);
            } else if inner.len() == 1 && inner[0].row > ROWS / 2 {
                self.set_phase(DepotPhase::Exit);
            }
        } else {
            self.restore_last(f);
        }

        let level = cones.iter().map(|c| c.row).sum::<i32>() / cones.len() as i32;
        if self.phase == DepotPhase::Cruise
            && (level as f64 > ROWS as f64 * 0.24 || level == 0)
            && tick(&mut self.rec) > 3
        {
            self.set_phase(DepotPhase::Stop);
        }
        self.record(f);
    }
}

impl Default for DepotZone {
    fn default() -> Self {
        Self::new(DepotParams::default())
    }
}

impl Zone for DepotZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Depot
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        let half = (ROWS / 2) as usize;
        match self.phase {
            DepotPhase::None => {
                if self.immunity <= self.params.immunity_frames {
                    tick(&mut self.immunity);
                } else {
                    let seen = contains(input.detections, Label::Tractor);
                    if self.trigger.update(seen, self.params.trigger) {
                        log::info!("depot: marker confirmed");
                        self.set_phase(DepotPhase::Enable);
                    }
                }
            }
            DepotPhase::Enable => {
                if tick(&mut self.exit) > 60 {
                    log::debug!("depot: bay not found, giving up");
                    self.reset();
                    return false;
                }
                let cones = centers(input.detections, Label::Cone);
                let near = if frame.left.len() < 10 {
                    None
                } else {
                    match (at_fraction(&frame.left, 0.5), at_fraction(&frame.left, 0.8)) {
                        (Some(a), Some(b)) => lowest_cone_near_line(&cones, a, b, 50.0),
                        _ => None,
                    }
                };
                if near.is_some_and(|c| c.row as f64 > ROWS as f64 * 0.6) && tick(&mut self.rec) >= 2 {
                    self.set_phase(DepotPhase::Enter);
                }
            }
            DepotPhase::Enter => {
                if frame.both_longer_than(half) {
                    tick(&mut self.exit);
                }
                if frame.both_shorter_than(half) && tick(&mut self.rec) > 10 {
                    self.set_phase(DepotPhase::Cruise);
                }

                let start = Point::new(ROWS - 40, COLS - 1);
                let end = Point::new(50, 0);
                let mid = Point::new(
                    ((start.row + end.row) as f64 * 0.4) as i32,
                    ((start.col + end.col) as f64 * 0.6) as i32,
                );
                frame.right = bezier_clamped(0.05, &[start, mid, end]);
                let offset = input.mapping.params().lane_offset;
                frame.left = input
                    .mapping
                    .predict_opposite_edge(&frame.right, Side::Left, offset, None);
                self.record(frame);
            }
            DepotPhase::Cruise => self.cruise(frame, input),
            DepotPhase::Stop => {
                self.stopping = true;
                if tick(&mut self.rec) > self.params.stop_frames {
                    self.stopping = false;
                    self.set_phase(DepotPhase::Exit);
                }
            }
            DepotPhase::Exit => match self.history.pop() {
                Some((left, right)) => {
                    frame.left = left;
                    frame.right = right;
                }
                None => {
                    log::info!("depot: left the bay");
                    self.reset();
                }
            },
        }
        self.phase != DepotPhase::None
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::testing::{det_at, edges_frame, input_with, straight_frame, Fixture};

    fn enabled(fx: &Fixture) -> DepotZone {
        let mut zone = DepotZone::default();
        for _ in 0..=20 {
            let mut f = straight_frame(60, 260);
            assert!(!zone.detect(&mut f, &mut input_with(fx, &[])));
        }
        let marker = [det_at(Label::Tractor, 80, 200)];
        for _ in 0..4 {
            let mut f = straight_frame(60, 260);
            zone.detect(&mut f, &mut input_with(fx, &marker));
        }
        assert_eq!(zone.phase(), DepotPhase::Enable);
        zone
    }

    #[test]
    fn marker_is_ignored_during_immunity() {
        let fx = Fixture::default();
        let mut zone = DepotZone::default();
        let marker = [det_at(Label::Tractor, 80, 200)];
        for _ in 0..20 {
            let mut f = straight_frame(60, 260);
            assert!(!zone.detect(&mut f, &mut input_with(&fx, &marker)));
        }
        assert_eq!(zone.phase(), DepotPhase::None);
    }

    #[test]
    fn full_visit_replays_the_entry_path() {
        let fx = Fixture::default();
        let mut zone = enabled(&fx);

        let near_cone = [det_at(Label::Cone, 170, 62)];
        for _ in 0..2 {
            let mut f = straight_frame(60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &near_cone)));
        }
        assert_eq!(zone.phase(), DepotPhase::Enter);

        for _ in 0..11 {
            let mut f = edges_frame(40, 60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
            assert_eq!(f.right[0], Point::new(ROWS - 40, COLS - 1));
            assert!(!f.left.is_empty());
        }
        assert_eq!(zone.phase(), DepotPhase::Cruise);
        assert_eq!(zone.history_len(), 11);

        let cones = [
            det_at(Label::Cone, 150, 120),
            det_at(Label::Cone, 100, 200),
            det_at(Label::Cone, 60, 250),
        ];
        for _ in 0..4 {
            let mut f = edges_frame(40, 60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &cones)));
            assert_eq!(f.left[0], Point::new(150, 120));
        }
        assert_eq!(zone.phase(), DepotPhase::Stop);
        assert_eq!(zone.history_len(), 15);

        for _ in 0..41 {
            let mut f = edges_frame(40, 60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        }
        assert_eq!(zone.phase(), DepotPhase::Exit);
        assert!(!zone.stopping());

        let mut replayed = Vec::new();
        for _ in 0..15 {
            let mut f = edges_frame(40, 60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
            replayed.push(f.left[0]);
        }
        assert_eq!(replayed[0], Point::new(150, 120));
        assert_ne!(replayed[14], Point::new(150, 120));

        let mut f = edges_frame(40, 60, 260);
        assert!(!zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone, DepotZone::default());
    }

    #[test]
    fn late_bay_does_not_shorten_the_cruise() {
        let fx = Fixture::default();
        let mut zone = enabled(&fx);
        for _ in 0..40 {
            let mut f = straight_frame(60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        }
        let near_cone = [det_at(Label::Cone, 170, 62)];
        for _ in 0..2 {
            let mut f = straight_frame(60, 260);
            zone.detect(&mut f, &mut input_with(&fx, &near_cone));
        }
        assert_eq!(zone.phase(), DepotPhase::Enter);
        for _ in 0..11 {
            let mut f = straight_frame(60, 260);
            zone.detect(&mut f, &mut input_with(&fx, &[]));
        }
        assert_eq!(zone.phase(), DepotPhase::Enter);
        for _ in 0..11 {
            let mut f = edges_frame(40, 60, 260);
            zone.detect(&mut f, &mut input_with(&fx, &[]));
        }
        assert_eq!(zone.phase(), DepotPhase::Cruise);

        for _ in 0..30 {
            let mut f = straight_frame(60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
            assert_eq!(zone.phase(), DepotPhase::Cruise);
        }
        let mut f = straight_frame(60, 260);
        zone.detect(&mut f, &mut input_with(&fx, &[]));
        assert_eq!(zone.phase(), DepotPhase::Stop);
    }

    #[test]
    fn enable_gives_up_without_a_bay() {
        let fx = Fixture::default();
        let mut zone = enabled(&fx);
        for _ in 0..60 {
            let mut f = straight_frame(60, 260);
            assert!(zone.detect(&mut f, &mut input_with(&fx, &[])));
        }
        let mut f = straight_frame(60, 260);
        assert!(!zone.detect(&mut f, &mut input_with(&fx, &[])));
        assert_eq!(zone.phase(), DepotPhase::None);
    }

    #[test]
    fn phase_indices_follow_the_visit_order() {
        let idx: Vec<u8> = [
            DepotPhase::None,
            DepotPhase::Enable,
            DepotPhase::Enter,
            DepotPhase::Cruise,
            DepotPhase::Stop,
            DepotPhase::Exit,
        ]
        .iter()
        .map(|p| p.index())
        .collect();
        assert_eq!(idx, [0, 1, 2, 3, 4, 5]);
    }
}
