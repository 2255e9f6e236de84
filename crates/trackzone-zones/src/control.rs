//! Steering and speed command generation from the centerline.

use serde::{Deserialize, Serialize};
use trackzone_core::{Side, IMAGE_COLS, IMAGE_ROWS};

use crate::centerline::Centerline;
use crate::zones::DepotPhase;
use crate::ZoneKind;

/// Largest change of the steering error between two frames.
const MAX_ERROR_STEP: i32 = IMAGE_COLS / 10;
const SHIFT_LOW: u8 = 0;
const SHIFT_MID: u8 = 5;
const SHIFT_HIGH: u8 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    pub speed_low: f64,
    pub speed_high: f64,
    /// Speed while a slow-down request is latched.
    pub speed_down: f64,
    pub speed_bridge: f64,
    pub speed_slowzone: f64,
    pub speed_garage: f64,
    pub speed_ring: f64,
    pub speed_cross: f64,
    pub run_p1: f64,
    pub run_p2: f64,
    pub turn_d: f64,
    /// Gains inside a left-hand roundabout.
    pub ring_p1: f64,
    pub ring_p2: f64,
    /// Gains inside a right-hand roundabout.
    pub right_p1: f64,
    pub right_p2: f64,
    /// Servo pulse width for straight ahead.
    pub servo_mid: u16,
}

impl Default for ControlParams {
    fn default() -> Self {
        Self {
            speed_low: 1.0,
            speed_high: 1.0,
            speed_down: 0.6,
            speed_bridge: 1.0,
            speed_slowzone: 1.0,
            speed_garage: 1.0,
            speed_ring: 1.0,
            speed_cross: 0.6,
            run_p1: 0.9,
            run_p2: 0.018,
            turn_d: 3.5,
            ring_p1: 0.9,
            ring_p2: 0.018,
            right_p1: 1.7,
            right_p2: 0.009,
            servo_mid: 1500,
        }
    }
}

/// One frame of actuator output.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DriveCommand {
    pub servo_pwm: u16,
    /// Signed motor speed; negative drives backwards.
    pub speed: f64,
}

/// What the controller needs to know about the zone situation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveContext {
    pub active: Option<ZoneKind>,
    /// Latched roundabout direction, if the roundabout is active.
    pub ring_side: Option<Side>,
    pub slow_down: bool,
    pub depot_phase: DepotPhase,
}

/// PD steering plus a shift-counter speed controller.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionController {
    params: ControlParams,
    last_error: i32,
    shift: u8,
}

impl MotionController {
    pub fn new(params: ControlParams) -> Self {
        Self {
            params,
            last_error: 0,
            shift: SHIFT_LOW,
        }
    }

    #[inline]
    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    #[inline]
    pub fn last_error(&self) -> i32 {
        self.last_error
    }

    #[inline]
    pub fn shift(&self) -> u8 {
        self.shift
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.params);
    }

    /// Servo pulse width steering towards `control_center`.
    ///
    /// The proportional gain grows with the error magnitude; `ring_side`
    /// selects the roundabout gain set.
    pub fn steer(&mut self, control_center: i32, ring_side: Option<Side>) -> u16 {
        let p = &self.params;
        let last = self.last_error;
        let error = (control_center - IMAGE_COLS / 2)
            .clamp(last - MAX_ERROR_STEP, last + MAX_ERROR_STEP);

        let (p1, p2) = match ring_side {
            None => (p.run_p1, p.run_p2),
            Some(Side::Left) => (p.ring_p1, p.ring_p2),
            Some(Side::Right) => (p.right_p1, p.right_p2),
        };
        let gain = f64::from(error.abs()) * p2 + p1;
        let diff = (f64::from(error) * gain + f64::from(error - last) * p.turn_d) as i32;
        self.last_error = error;

        (i32::from(p.servo_mid) + diff).clamp(0, i32::from(u16::MAX)) as u16
    }

    /// Base-track speed: fast after a run of low-variance centerlines.
    pub fn shift_speed(&mut self, slow_down: bool, centerline: &Centerline) -> f64 {
        let p = &self.params;
        if slow_down {
            self.shift = SHIFT_LOW;
            return p.speed_down;
        }

        let far_row = centerline.points.last().map(|c| c.row);
        if centerline.points.len() < 10 || far_row.is_some_and(|r| r > IMAGE_ROWS / 2) {
            self.shift = SHIFT_LOW;
            return p.speed_low;
        }

        if centerline.sigma.abs() < 100.0 {
            self.shift = (self.shift + 1).min(SHIFT_HIGH);
        } else {
            self.shift = self.shift.saturating_sub(1).max(SHIFT_LOW);
        }
        if self.shift > SHIFT_MID {
            p.speed_high
        } else {
            p.speed_low
        }
    }

    /// Full command for one frame.
    pub fn command(&mut self, centerline: &Centerline, ctx: DriveContext) -> DriveCommand {
        let ring_side = match ctx.active {
            Some(ZoneKind::Roundabout) => ctx.ring_side,
            _ => None,
        };
        let servo_pwm = self.steer(centerline.control_center, ring_side);

        let p = self.params;
        let speed = match ctx.active {
            Some(ZoneKind::Garage) => p.speed_garage,
            Some(ZoneKind::Bridge) => p.speed_bridge,
            Some(ZoneKind::Slowzone) => p.speed_slowzone,
            Some(ZoneKind::Roundabout) => p.speed_ring,
            Some(ZoneKind::Intersection) => p.speed_cross,
            _ => self.shift_speed(ctx.slow_down, centerline),
        };
        let speed = match (ctx.active, ctx.depot_phase) {
            (Some(ZoneKind::Depot), DepotPhase::Stop) => 0.0,
            (Some(ZoneKind::Depot), DepotPhase::Exit) => -speed,
            _ => speed,
        };

        DriveCommand { servo_pwm, speed }
    }
}

impl Default for MotionController {
    fn default() -> Self {
        Self::new(ControlParams::default())
    }
}
