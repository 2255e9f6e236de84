//! Frame recordings: a JSON array of edge snapshots with their detections.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use trackzone_core::{GrayImage, GrayImageView, IMAGE_COLS, IMAGE_ROWS};
use trackzone_zones::{ConfigError, Detection, Engine, FrameOutput, NoRetrace, TrackFrame};

/// One recorded camera frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: TrackFrame,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

pub fn load_recording(path: impl AsRef<Path>) -> Result<Vec<FrameRecord>, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn write_recording(path: impl AsRef<Path>, records: &[FrameRecord]) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)?;
    Ok(())
}

/// Run every record through `engine` in order.
///
/// With `binary` set, each frame segments the drivable area from it before
/// the zones run. Without it the zones see an empty mask.
pub fn replay(
    engine: &mut Engine,
    records: Vec<FrameRecord>,
    binary: Option<GrayImageView<'_>>,
) -> Vec<FrameOutput> {
    let blank = GrayImage::new(IMAGE_COLS as usize, IMAGE_ROWS as usize);
    records
        .into_iter()
        .map(|mut rec| match binary {
            Some(img) => engine.process_binary(&mut rec.frame, &rec.detections, img, &mut NoRetrace),
            None => engine.process(&mut rec.frame, &rec.detections, blank.view(), &mut NoRetrace),
        })
        .collect()
}
