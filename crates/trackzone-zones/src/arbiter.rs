//! Per-frame zone arbitration.
//!
//! At most one zone is active. The active zone is the only one invoked
//! until it reports inactive; while no zone is active every enabled zone is
//! tried in [`ZoneKind::PRIORITY`] order and the first one that reports
//! active wins the frame.

use serde::{Deserialize, Serialize};
use trackzone_core::Side;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::debounce::tick;
use crate::params::{EngineParams, OutOfTrackParams, RingTimerParams, ZoneEnables};
use crate::zones::{
    BridgeZone, DepotPhase, DepotZone, FarmlandZone, GarageZone, IntersectionZone,
    RoundaboutZone, SiloZone, SlowzoneZone,
};
use crate::{TrackFrame, Zone, ZoneInput, ZoneKind};

/// Cap of the frame counter between two lap starts.
const LAP_COUNTER_CAP: u32 = 200;
/// Frames a lap must last before a start-line crossing counts.
const MIN_LAP_FRAMES: u32 = 60;
/// Frames after the last start-line crossing before garage entry opens.
const ENTRY_DELAY_FRAMES: u32 = 100;

/// Frame-counted roundabout re-arm timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingTimer {
    params: RingTimerParams,
    since_activation: Option<u32>,
}

impl RingTimer {
    pub fn new(params: RingTimerParams) -> Self {
        Self {
            params,
            since_activation: None,
        }
    }

    /// Restart the windows on a roundabout activation.
    pub fn start(&mut self) {
        self.since_activation = Some(0);
    }

    pub fn advance(&mut self) {
        if let Some(n) = self.since_activation.as_mut() {
            tick(n);
        }
    }

    /// Whether a new roundabout activation is allowed on this frame.
    pub fn allows(&self) -> bool {
        let p = &self.params;
        match self.since_activation {
            None => true,
            Some(n) => n < p.hold_frames || (p.rearm_frames..p.blocked_frames).contains(&n),
        }
    }
}

/// Result of one arbitration step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ArbiterOutput {
    pub active: Option<ZoneKind>,
    /// Set on the frame a zone goes from inactive to active.
    pub activated: Option<ZoneKind>,
    /// Latched speed reduction.
    pub slow_down: bool,
    /// One-shot stop request.
    pub stop: bool,
    pub depot_phase: DepotPhase,
    /// Latched roundabout direction while the roundabout is active.
    pub ring_side: Option<Side>,
    pub laps: u32,
    pub lap_started: bool,
}

/// Owns every zone plus the cross-zone bookkeeping: laps, the slow-down
/// latch, the out-of-track guard and the optional ring timer.
#[derive(Clone, Debug)]
pub struct Arbiter {
    enable: ZoneEnables,
    laps_target: u32,
    slow_down_frames: u32,
    out_of_track: OutOfTrackParams,
    garage: GarageZone,
    farmland: FarmlandZone,
    depot: DepotZone,
    silo: SiloZone,
    bridge: BridgeZone,
    slowzone: SlowzoneZone,
    roundabout: RoundaboutZone,
    intersection: IntersectionZone,
    ring_timer: Option<RingTimer>,
    active: Option<ZoneKind>,
    laps: u32,
    lap_frames: u32,
    slow_left: u32,
    lost: u32,
    recovered: u32,
}

impl Arbiter {
    pub fn new(params: &EngineParams) -> Self {
        Self {
            enable: params.enable,
            laps_target: params.laps,
            slow_down_frames: params.slow_down_frames,
            out_of_track: params.out_of_track,
            garage: GarageZone::new(params.garage),
            farmland: FarmlandZone::new(params.farmland),
            depot: DepotZone::new(params.depot),
            silo: SiloZone::new(params.silo),
            bridge: BridgeZone::new(params.bridge),
            slowzone: SlowzoneZone::new(params.slowzone),
            roundabout: RoundaboutZone::new(params.roundabout),
            intersection: IntersectionZone::new(params.intersection),
            ring_timer: params.ring_timer.map(RingTimer::new),
            // The vehicle starts parked: the garage exit runs first.
            active: params.enable.garage.then_some(ZoneKind::Garage),
            laps: 1,
            lap_frames: 0,
            slow_left: 0,
            lost: 0,
            recovered: 0,
        }
    }

    #[inline]
    pub fn active(&self) -> Option<ZoneKind> {
        self.active
    }

    #[inline]
    pub fn laps(&self) -> u32 {
        self.laps
    }

    #[inline]
    pub fn garage(&self) -> &GarageZone {
        &self.garage
    }

    #[inline]
    pub fn depot(&self) -> &DepotZone {
        &self.depot
    }

    #[inline]
    pub fn roundabout(&self) -> &RoundaboutZone {
        &self.roundabout
    }

    pub fn zone(&self, kind: ZoneKind) -> &dyn Zone {
        match kind {
            ZoneKind::Garage => &self.garage,
            ZoneKind::Farmland => &self.farmland,
            ZoneKind::Depot => &self.depot,
            ZoneKind::Silo => &self.silo,
            ZoneKind::Bridge => &self.bridge,
            ZoneKind::Slowzone => &self.slowzone,
            ZoneKind::Roundabout => &self.roundabout,
            ZoneKind::Intersection => &self.intersection,
        }
    }

    fn zone_mut(&mut self, kind: ZoneKind) -> &mut dyn Zone {
        match kind {
            ZoneKind::Garage => &mut self.garage,
            ZoneKind::Farmland => &mut self.farmland,
            ZoneKind::Depot => &mut self.depot,
            ZoneKind::Silo => &mut self.silo,
            ZoneKind::Bridge => &mut self.bridge,
            ZoneKind::Slowzone => &mut self.slowzone,
            ZoneKind::Roundabout => &mut self.roundabout,
            ZoneKind::Intersection => &mut self.intersection,
        }
    }

    /// Reset every zone except the garage, which also tracks the laps.
    fn reset_track_zones(&mut self) {
        for kind in ZoneKind::PRIORITY {
            if kind != ZoneKind::Garage {
                self.zone_mut(kind).reset();
            }
        }
    }

    /// Start-line crossings while the vehicle is on the plain track or in
    /// the garage zone.
    fn lap_check(&mut self, input: &ZoneInput<'_>) -> bool {
        if self.lap_frames < LAP_COUNTER_CAP {
            self.lap_frames += 1;
        }
        let started = self.garage.starting_check(input.detections);
        if started {
            log::info!("lap start (lap {}, {} frames)", self.laps, self.lap_frames);
            self.reset_track_zones();
            if self.lap_frames > MIN_LAP_FRAMES {
                self.laps += 1;
                self.lap_frames = 0;
            }
        }
        if self.laps >= self.laps_target && self.lap_frames > ENTRY_DELAY_FRAMES {
            self.garage.enable_entry();
        }
        started
    }

    fn allows(&self, kind: ZoneKind) -> bool {
        if !self.enable.is_enabled(kind) {
            return false;
        }
        match (kind, &self.ring_timer) {
            (ZoneKind::Roundabout, Some(timer)) => timer.allows(),
            _ => true,
        }
    }

    /// Bump the lost/recovered counters; `true` on the frame the guard trips.
    fn guard_out_of_track(&mut self, frame: &TrackFrame) -> bool {
        let p = self.out_of_track;
        let exempt = self.active.is_some_and(ZoneKind::tolerates_lost_edges);
        if frame.both_shorter_than(p.min_points) && !exempt {
            self.recovered = 0;
            if tick(&mut self.lost) == p.stop_frames + 1 {
                log::info!("out of track for {} frames: stop", self.lost);
                return true;
            }
        } else if tick(&mut self.recovered) > p.recover_frames {
            self.lost = 0;
            self.recovered = p.recover_frames;
        }
        false
    }

    /// Run one frame through the zones. `frame` may be rewritten by the
    /// zone that handles it.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(active = ?self.active))
    )]
    pub fn process(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> ArbiterOutput {
        if let Some(timer) = self.ring_timer.as_mut() {
            timer.advance();
        }

        let mut lap_started = false;
        if self.enable.garage && matches!(self.active, None | Some(ZoneKind::Garage)) {
            lap_started = self.lap_check(input);
        }

        let was_finished = self.garage.finished();
        let mut slow_request = false;
        let mut activated = None;

        match self.active {
            Some(kind) => {
                let zone = self.zone_mut(kind);
                let still = zone.detect(frame, input);
                slow_request |= zone.slow_down();
                if !still {
                    log::debug!("{kind:?} released");
                    self.active = None;
                }
            }
            None => {
                for kind in ZoneKind::PRIORITY {
                    if !self.allows(kind) {
                        continue;
                    }
                    let zone = self.zone_mut(kind);
                    let hit = zone.detect(frame, input);
                    slow_request |= zone.slow_down();
                    if hit {
                        log::info!("{kind:?} activated");
                        self.active = Some(kind);
                        activated = Some(kind);
                        if kind == ZoneKind::Roundabout {
                            if let Some(timer) = self.ring_timer.as_mut() {
                                timer.start();
                            }
                        }
                        break;
                    }
                }
            }
        }

        if slow_request {
            self.slow_left = self.slow_down_frames;
        }
        let slow_down = self.slow_left > 0;
        self.slow_left = self.slow_left.saturating_sub(1);

        let mut stop = self.guard_out_of_track(frame);
        if self.garage.finished() && !was_finished {
            log::info!("parked: stop");
            stop = true;
        }

        ArbiterOutput {
            active: self.active,
            activated,
            slow_down,
            stop,
            depot_phase: self.depot.phase(),
            ring_side: match self.active {
                Some(ZoneKind::Roundabout) => self.roundabout.side(),
                _ => None,
            },
            laps: self.laps,
            lap_started,
        }
    }

    /// Return every zone and counter to the start-up state.
    pub fn reset(&mut self) {
        for kind in ZoneKind::PRIORITY {
            self.zone_mut(kind).reset();
        }
        if let Some(timer) = self.ring_timer.as_mut() {
            timer.since_activation = None;
        }
        self.active = self.enable.garage.then_some(ZoneKind::Garage);
        self.laps = 1;
        self.lap_frames = 0;
        self.slow_left = 0;
        self.lost = 0;
        self.recovered = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zones::testing::{det_at, edges_frame, input_with, straight_frame, Fixture};
    use crate::Label;

    fn without_garage() -> EngineParams {
        EngineParams {
            enable: ZoneEnables {
                garage: false,
                ..ZoneEnables::default()
            },
            ..EngineParams::default()
        }
    }

    #[test]
    fn ring_timer_windows() {
        let mut timer = RingTimer::new(RingTimerParams {
            hold_frames: 2,
            rearm_frames: 4,
            blocked_frames: 6,
        });
        assert!(timer.allows());
        timer.start();
        let mut allowed = Vec::new();
        for _ in 0..8 {
            allowed.push(timer.allows());
            timer.advance();
        }
        assert_eq!(
            allowed,
            [true, true, false, false, true, true, false, false]
        );
    }

    #[test]
    fn starts_in_the_garage_exit() {
        let fx = Fixture::default();
        let mut arb = Arbiter::new(&EngineParams::default());
        assert_eq!(arb.active(), Some(ZoneKind::Garage));
        let mut f = straight_frame(60, 260);
        let out = arb.process(&mut f, &mut input_with(&fx, &[]));
        assert_eq!(out.active, Some(ZoneKind::Garage));
        assert_eq!(out.activated, None);
        assert_eq!(out.laps, 1);
    }

    #[test]
    fn bridge_marker_activates_once() {
        let fx = Fixture::default();
        let mut arb = Arbiter::new(&without_garage());
        let marker = [det_at(Label::Bridge, 100, 160)];
        let mut events = Vec::new();
        for _ in 0..6 {
            let mut f = straight_frame(60, 260);
            let out = arb.process(&mut f, &mut input_with(&fx, &marker));
            events.extend(out.activated);
        }
        assert_eq!(events, [ZoneKind::Bridge]);
        assert_eq!(arb.active(), Some(ZoneKind::Bridge));
    }

    #[test]
    fn lost_edges_stop_once() {
        let fx = Fixture::default();
        let mut arb = Arbiter::new(&without_garage());
        let stops: Vec<usize> = (1..=25)
            .filter(|_| {
                let mut f = edges_frame(10, 60, 260);
                arb.process(&mut f, &mut input_with(&fx, &[])).stop
            })
            .collect();
        assert_eq!(stops, [21]);
    }

    #[test]
    fn recovery_clears_the_lost_counter() {
        let fx = Fixture::default();
        let mut arb = Arbiter::new(&without_garage());
        for _ in 0..15 {
            let mut f = edges_frame(10, 60, 260);
            arb.process(&mut f, &mut input_with(&fx, &[]));
        }
        for _ in 0..51 {
            let mut f = straight_frame(60, 260);
            arb.process(&mut f, &mut input_with(&fx, &[]));
        }
        let stopped = (0..20).any(|_| {
            let mut f = edges_frame(10, 60, 260);
            arb.process(&mut f, &mut input_with(&fx, &[])).stop
        });
        assert!(!stopped);
    }

    #[test]
    fn disabled_zones_are_never_invoked() {
        let fx = Fixture::default();
        let mut params = without_garage();
        params.enable.bridge = false;
        let mut arb = Arbiter::new(&params);
        let marker = [det_at(Label::Bridge, 100, 160)];
        for _ in 0..10 {
            let mut f = straight_frame(60, 260);
            let out = arb.process(&mut f, &mut input_with(&fx, &marker));
            assert_eq!(out.active, None);
        }
    }
}
