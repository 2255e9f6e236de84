//! Ramp/bridge: a landmark-triggered hold with thinned look-ahead.

use serde::{Deserialize, Serialize};
use trackzone_core::IMAGE_ROWS;

use crate::debounce::{tick, Debounce, DebounceParams};
use crate::detection::{contains, Label};
use crate::{TrackFrame, Zone, ZoneInput, ZoneKind};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeParams {
    pub trigger: DebounceParams,
    /// Frames the zone stays active once triggered.
    pub hold_frames: u32,
}

impl Default for BridgeParams {
    fn default() -> Self {
        Self {
            trigger: DebounceParams::new(4, 8),
            hold_frames: 30,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeState {
    #[default]
    Idle,
    OnRamp,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BridgeZone {
    params: BridgeParams,
    state: BridgeState,
    trigger: Debounce,
    held: u32,
}

impl BridgeZone {
    pub fn new(params: BridgeParams) -> Self {
        Self {
            params,
            state: BridgeState::Idle,
            trigger: Debounce::default(),
            held: 0,
        }
    }

    #[inline]
    pub fn params(&self) -> &BridgeParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> BridgeState {
        self.state
    }
}

impl Default for BridgeZone {
    fn default() -> Self {
        Self::new(BridgeParams::default())
    }
}

impl Zone for BridgeZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Bridge
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        match self.state {
            BridgeState::Idle => {
                let seen = contains(input.detections, Label::Bridge);
                if self.trigger.update(seen, self.params.trigger) {
                    log::debug!("bridge: ramp ahead");
                    self.state = BridgeState::OnRamp;
                    self.held = 0;
                    return true;
                }
                false
            }
            BridgeState::OnRamp => {
                // The far rows tilt on the ramp and mislead the steering.
                let half = IMAGE_ROWS as usize / 2;
                if frame.both_longer_than(half) {
                    frame.keep_every_other();
                }
                if tick(&mut self.held) > self.params.hold_frames {
                    log::debug!("bridge: hold elapsed");
                    self.reset();
                }
                true
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}
