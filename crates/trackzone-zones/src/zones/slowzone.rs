//! Slow zone: bump or animal markers trigger a short thinned hold.

use serde::{Deserialize, Serialize};
use trackzone_core::IMAGE_ROWS;

use crate::debounce::{tick, Debounce, DebounceParams};
use crate::detection::Label;
use crate::{TrackFrame, Zone, ZoneInput, ZoneKind};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowzoneParams {
    pub trigger: DebounceParams,
    pub hold_frames: u32,
}

impl Default for SlowzoneParams {
    fn default() -> Self {
        Self {
            trigger: DebounceParams::new(4, 8),
            hold_frames: 15,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlowzoneState {
    #[default]
    Idle,
    Active,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SlowzoneZone {
    params: SlowzoneParams,
    state: SlowzoneState,
    trigger: Debounce,
    held: u32,
}

impl SlowzoneZone {
    pub fn new(params: SlowzoneParams) -> Self {
        Self {
            params,
            state: SlowzoneState::Idle,
            trigger: Debounce::default(),
            held: 0,
        }
    }

    #[inline]
    pub fn params(&self) -> &SlowzoneParams {
        &self.params
    }

    #[inline]
    pub fn state(&self) -> SlowzoneState {
        self.state
    }
}

impl Default for SlowzoneZone {
    fn default() -> Self {
        Self::new(SlowzoneParams::default())
    }
}

impl Zone for SlowzoneZone {
    fn kind(&self) -> ZoneKind {
        ZoneKind::Slowzone
    }

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool {
        let seen = input
            .detections
            .iter()
            .any(|d| matches!(d.label, Label::Bump | Label::Pig));
        // Markers seen again while inside restart the hold.
        if self.trigger.update(seen, self.params.trigger) {
            if self.state == SlowzoneState::Idle {
                log::debug!("slowzone: entered");
            }
            self.state = SlowzoneState::Active;
            self.held = 0;
            return true;
        }
        if self.state == SlowzoneState::Idle {
            return false;
        }

        if tick(&mut self.held) > self.params.hold_frames {
            log::debug!("slowzone: left");
            self.reset();
            return false;
        }
        let half = IMAGE_ROWS as usize / 2;
        if frame.both_longer_than(half) {
            frame.keep_every_other();
        }
        true
    }

    fn reset(&mut self) {
        *self = Self::new(self.params);
    }
}
