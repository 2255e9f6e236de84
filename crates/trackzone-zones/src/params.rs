//! Engine configuration with JSON load/save helpers.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use trackzone_core::{PathSearchParams, PerspectiveParams};

use crate::control::ControlParams;
use crate::zones::{
    BridgeParams, DepotParams, FarmlandParams, GarageParams, IntersectionParams,
    RoundaboutParams, SiloParams, SlowzoneParams,
};
use crate::{ConfigError, ZoneKind};

/// Per-zone switches; a disabled zone is never invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneEnables {
    pub garage: bool,
    pub farmland: bool,
    pub depot: bool,
    pub silo: bool,
    pub bridge: bool,
    pub slowzone: bool,
    pub roundabout: bool,
    pub intersection: bool,
}

impl Default for ZoneEnables {
    fn default() -> Self {
        Self {
            garage: true,
            farmland: true,
            depot: true,
            silo: true,
            bridge: true,
            slowzone: true,
            roundabout: true,
            intersection: true,
        }
    }
}

impl ZoneEnables {
    pub fn is_enabled(&self, kind: ZoneKind) -> bool {
        match kind {
            ZoneKind::Garage => self.garage,
            ZoneKind::Farmland => self.farmland,
            ZoneKind::Depot => self.depot,
            ZoneKind::Silo => self.silo,
            ZoneKind::Bridge => self.bridge,
            ZoneKind::Slowzone => self.slowzone,
            ZoneKind::Roundabout => self.roundabout,
            ZoneKind::Intersection => self.intersection,
        }
    }
}

/// Runaway guard: stop when both edges stay short for too long.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutOfTrackParams {
    /// An edge with fewer points counts as lost.
    pub min_points: usize,
    /// Consecutive lost frames before the stop fires.
    pub stop_frames: u32,
    /// Consecutive normal frames that clear the lost counter.
    pub recover_frames: u32,
}

impl Default for OutOfTrackParams {
    fn default() -> Self {
        Self {
            min_points: 30,
            stop_frames: 20,
            recover_frames: 50,
        }
    }
}

/// Frame windows of the roundabout re-arm timer, counted from the
/// roundabout activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingTimerParams {
    /// Detection stays allowed this long after activation.
    pub hold_frames: u32,
    /// Detection is allowed again from here on.
    pub rearm_frames: u32,
    /// Detection is blocked for good from here on.
    pub blocked_frames: u32,
}

impl Default for RingTimerParams {
    fn default() -> Self {
        // 5 s, 35 s and 50 s at 25 frames per second.
        Self {
            hold_frames: 125,
            rearm_frames: 875,
            blocked_frames: 1250,
        }
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineParams {
    pub enable: ZoneEnables,
    /// Laps to drive before garage entry is enabled.
    pub laps: u32,
    /// Frames after start-up during which no drive command is issued.
    pub warmup_frames: u32,
    /// Frames a slow-down request stays latched.
    pub slow_down_frames: u32,
    pub out_of_track: OutOfTrackParams,
    /// Roundabout re-arm timer; `None` leaves ring detection always allowed.
    pub ring_timer: Option<RingTimerParams>,
    pub garage: GarageParams,
    pub farmland: FarmlandParams,
    pub depot: DepotParams,
    pub silo: SiloParams,
    pub bridge: BridgeParams,
    pub slowzone: SlowzoneParams,
    pub roundabout: RoundaboutParams,
    pub intersection: IntersectionParams,
    pub perspective: PerspectiveParams,
    pub path_search: PathSearchParams,
    pub control: ControlParams,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            enable: ZoneEnables::default(),
            laps: 2,
            warmup_frames: 30,
            slow_down_frames: 50,
            out_of_track: OutOfTrackParams::default(),
            ring_timer: None,
            garage: GarageParams::default(),
            farmland: FarmlandParams::default(),
            depot: DepotParams::default(),
            silo: SiloParams::default(),
            bridge: BridgeParams::default(),
            slowzone: SlowzoneParams::default(),
            roundabout: RoundaboutParams::default(),
            intersection: IntersectionParams::default(),
            perspective: PerspectiveParams::default(),
            path_search: PathSearchParams::default(),
            control: ControlParams::default(),
        }
    }
}

impl EngineParams {
    /// Load a JSON config from disk; missing sections take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&raw)?;
        if params.laps == 0 && params.enable.garage {
            log::warn!("laps = 0: garage entry is enabled right after the first lap start");
        }
        Ok(params)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_in_defaults() {
        let params: EngineParams = serde_json::from_str(
            r#"{ "laps": 3, "enable": { "depot": false }, "ring_timer": { "hold_frames": 10 } }"#,
        )
        .expect("valid config");
        assert_eq!(params.laps, 3);
        assert!(!params.enable.depot);
        assert!(params.enable.garage);
        let timer = params.ring_timer.expect("timer configured");
        assert_eq!(timer.hold_frames, 10);
        assert_eq!(timer.rearm_frames, 875);
        assert_eq!(params.control, ControlParams::default());
    }

    #[test]
    fn enables_map_onto_zone_kinds() {
        let enable = ZoneEnables {
            silo: false,
            ..ZoneEnables::default()
        };
        assert!(!enable.is_enabled(ZoneKind::Silo));
        assert!(ZoneKind::PRIORITY
            .iter()
            .filter(|k| **k != ZoneKind::Silo)
            .all(|k| enable.is_enabled(*k)));
    }
}
