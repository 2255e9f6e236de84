//! The per-frame pipeline: zone arbitration, centerline and drive command.

use std::path::Path;

use serde::{Deserialize, Serialize};
use trackzone_core::{path_search, GrayImageView, PerspectiveMapping, Point};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::arbiter::{Arbiter, ArbiterOutput};
use crate::centerline::{self, Centerline};
use crate::control::{DriveCommand, DriveContext, MotionController};
use crate::{ConfigError, Detection, EngineParams, TrackFrame, TrackRetrace, ZoneInput};

/// Everything produced for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub index: u64,
    /// Edges after zone repair and centerline trimming.
    pub left: Vec<Point>,
    pub right: Vec<Point>,
    pub centerline: Centerline,
    pub zone: ArbiterOutput,
    /// `None` while the start-up warm-up is running.
    pub command: Option<DriveCommand>,
}

/// Owns the mapping, the zones and the controller for one vehicle run.
#[derive(Clone, Debug)]
pub struct Engine {
    params: EngineParams,
    mapping: PerspectiveMapping,
    arbiter: Arbiter,
    controller: MotionController,
    frames: u64,
    stopped: bool,
}

impl Engine {
    pub fn new(params: EngineParams) -> Result<Self, ConfigError> {
        let mapping = PerspectiveMapping::new(params.perspective.clone())?;
        Ok(Self {
            arbiter: Arbiter::new(&params),
            controller: MotionController::new(params.control),
            mapping,
            params,
            frames: 0,
            stopped: false,
        })
    }

    /// Build from a JSON parameter file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::new(EngineParams::load_json(path)?)
    }

    #[inline]
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    #[inline]
    pub fn mapping(&self) -> &PerspectiveMapping {
        &self.mapping
    }

    #[inline]
    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    /// A stop was requested; every later command holds the vehicle.
    #[inline]
    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// Process one frame given a precomputed drivable-area mask.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(frame = self.frames))
    )]
    pub fn process(
        &mut self,
        frame: &mut TrackFrame,
        detections: &[Detection],
        path: GrayImageView<'_>,
        retrace: &mut dyn TrackRetrace,
    ) -> FrameOutput {
        let index = self.frames;
        self.frames += 1;

        let mut input = ZoneInput {
            detections,
            path,
            mapping: &self.mapping,
            retrace,
        };
        let zone = self.arbiter.process(frame, &mut input);
        if zone.stop && !self.stopped {
            log::info!("stop requested at frame {index}");
            self.stopped = true;
        }

        let centerline = centerline::compute(frame);

        let command = if index < u64::from(self.params.warmup_frames) {
            None
        } else {
            let ctx = DriveContext {
                active: zone.active,
                ring_side: zone.ring_side,
                slow_down: zone.slow_down,
                depot_phase: zone.depot_phase,
            };
            let mut cmd = self.controller.command(&centerline, ctx);
            if self.stopped {
                cmd.speed = 0.0;
            }
            Some(cmd)
        };

        FrameOutput {
            index,
            left: frame.left.clone(),
            right: frame.right.clone(),
            centerline,
            zone,
            command,
        }
    }

    /// Segment the drivable area of `binary` first, then [`Engine::process`].
    pub fn process_binary(
        &mut self,
        frame: &mut TrackFrame,
        detections: &[Detection],
        binary: GrayImageView<'_>,
        retrace: &mut dyn TrackRetrace,
    ) -> FrameOutput {
        let found = path_search(&binary, &self.params.path_search);
        self.process(frame, detections, found.mask.view(), retrace)
    }

    /// Back to the start-up state, keeping the parameters.
    pub fn reset(&mut self) {
        self.arbiter.reset();
        self.controller.reset();
        self.frames = 0;
        self.stopped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NoRetrace, ZoneEnables};
    use trackzone_core::{GrayImage, IMAGE_COLS, IMAGE_ROWS};

    fn straight() -> TrackFrame {
        let rows = || (40..240).rev();
        TrackFrame::new(
            rows().map(|r| Point::new(r, 60)).collect(),
            rows().map(|r| Point::new(r, 260)).collect(),
        )
    }

    #[test]
    fn warm_up_withholds_commands() {
        let params = EngineParams {
            enable: ZoneEnables {
                garage: false,
                ..ZoneEnables::default()
            },
            warmup_frames: 3,
            ..EngineParams::default()
        };
        let mut engine = Engine::new(params).expect("default calibration");
        let path = GrayImage::new(IMAGE_COLS as usize, IMAGE_ROWS as usize);
        let outs: Vec<FrameOutput> = (0..5)
            .map(|_| engine.process(&mut straight(), &[], path.view(), &mut NoRetrace))
            .collect();
        assert!(outs[..3].iter().all(|o| o.command.is_none()));
        let cmd = outs[3].command.expect("warmed up");
        assert!((1490..=1510).contains(&cmd.servo_pwm));
        assert_eq!(outs[4].index, 4);
    }

    #[test]
    fn degenerate_calibration_is_rejected() {
        let mut params = EngineParams::default();
        params.perspective.top_points.pop();
        assert!(matches!(
            Engine::new(params),
            Err(ConfigError::Mapping(_))
        ));
    }

    #[test]
    fn reset_restarts_the_frame_count() {
        let mut engine = Engine::new(EngineParams::default()).expect("default calibration");
        let path = GrayImage::new(IMAGE_COLS as usize, IMAGE_ROWS as usize);
        engine.process(&mut straight(), &[], path.view(), &mut NoRetrace);
        engine.reset();
        let out = engine.process(&mut straight(), &[], path.view(), &mut NoRetrace);
        assert_eq!(out.index, 0);
        assert_eq!(out.zone.active, engine.arbiter().active());
    }
}
