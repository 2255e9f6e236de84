//! High-level facade crate for the `trackzone-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometry crate (`trackzone-core`) and the zone engine
//!   (`trackzone-zones`)
//! - replay of recorded frames through an [`zones::Engine`]
//! - (feature-gated) loading of binarized camera frames with the `image` crate
//!
//! ## Quickstart
//!
//! ```no_run
//! use trackzone::replay::{load_recording, replay};
//! use trackzone::zones::{Engine, EngineParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let records = load_recording("run.json")?;
//! let mut engine = Engine::new(EngineParams::default())?;
//! for out in replay(&mut engine, records, None) {
//!     println!("{} -> {:?}", out.index, out.command);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `trackzone::core`: points, Bezier synthesis, homography, path search.
//! - `trackzone::zones`: zones, arbitration, centerline and motion control.
//! - `trackzone::replay`: JSON frame recordings.
//! - `trackzone::mask` (feature `image`): binarized frames from image files.

pub use trackzone_core as core;
pub use trackzone_zones as zones;

pub use trackzone_core::{GrayImage, GrayImageView, Point};
pub use trackzone_zones::{
    Detection, DriveCommand, Engine, EngineParams, FrameOutput, TrackFrame, ZoneKind,
};

#[cfg(feature = "image")]
pub mod mask;
pub mod replay;
