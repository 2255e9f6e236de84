//! Zone state machines, arbitration and steering for lane-edge repair.
//!
//! Each frame the caller hands over the raw edge pair from its edge
//! extractor, the object detections and the drivable-area mask. The
//! [`Engine`] lets at most one zone rewrite the edges, derives the
//! centerline and turns it into a [`DriveCommand`].
//!
//! ```no_run
//! use trackzone_core::{GrayImage, Point};
//! use trackzone_zones::{Engine, EngineParams, NoRetrace, TrackFrame};
//!
//! let mut engine = Engine::new(EngineParams::default())?;
//! let mask = GrayImage::new(320, 240);
//! let mut frame = TrackFrame::new(
//!     (40..240).rev().map(|r| Point::new(r, 60)).collect(),
//!     (40..240).rev().map(|r| Point::new(r, 260)).collect(),
//! );
//! let out = engine.process(&mut frame, &[], mask.view(), &mut NoRetrace);
//! println!("{:?}", out.command);
//! # Ok::<(), trackzone_zones::ConfigError>(())
//! ```

mod arbiter;
pub mod centerline;
mod control;
mod debounce;
mod detection;
mod engine;
mod error;
mod frame;
mod params;
mod repair;
mod zone;
pub mod zones;

pub use arbiter::{Arbiter, ArbiterOutput, RingTimer};
pub use centerline::{Centerline, TrackStyle};
pub use control::{ControlParams, DriveCommand, DriveContext, MotionController};
pub use debounce::{Debounce, DebounceParams};
pub use detection::{BoundingBox, Detection, Label};
pub use engine::{Engine, FrameOutput};
pub use error::ConfigError;
pub use frame::{NoRetrace, TrackFrame, TrackRetrace};
pub use params::{EngineParams, OutOfTrackParams, RingTimerParams, ZoneEnables};
pub use repair::PathHistory;
pub use zone::{Zone, ZoneInput, ZoneKind};
pub use zones::{
    Approach, BridgeParams, BridgeState, BridgeZone, DepotParams, DepotPhase, DepotZone,
    FarmlandParams, FarmlandState, FarmlandZone, GarageHeuristic, GarageParams, GarageState,
    GarageZone, IntersectionParams, IntersectionZone, RoundaboutParams, RoundaboutState,
    RoundaboutZone, SiloParams, SiloState, SiloZone, SlowzoneParams, SlowzoneState, SlowzoneZone,
};
