use serde::{Deserialize, Serialize};
use trackzone_core::{Point, IMAGE_COLS};

/// Classes reported by the object detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Cone,
    /// Silo marker.
    Granary,
    Bridge,
    /// Depot marker.
    Tractor,
    Corn,
    /// Animal marker of the slow zone.
    Pig,
    Crosswalk,
    Bump,
}

/// Axis-aligned box in image pixels; `(x, y)` is the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: Label,
    #[serde(flatten)]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub score: f32,
}

impl Detection {
    pub fn new(label: Label, x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            label,
            bbox: BoundingBox {
                x,
                y,
                width,
                height,
            },
            score: 1.0,
        }
    }

    /// Box center as `(row, col)`.
    #[inline]
    pub fn center(&self) -> Point {
        let b = self.bbox;
        Point::new(b.y + b.height / 2, b.x + b.width / 2)
    }

    /// Middle of the bottom side of the box.
    #[inline]
    pub fn bottom(&self) -> Point {
        let b = self.bbox;
        Point::new(b.y + b.height, b.x + b.width / 2)
    }
}

/// True when any detection carries `label`.
pub fn contains(detections: &[Detection], label: Label) -> bool {
    detections.iter().any(|d| d.label == label)
}

/// Centers of every detection labelled `label`, in detector order.
pub fn centers(detections: &[Detection], label: Label) -> Vec<Point> {
    detections
        .iter()
        .filter(|d| d.label == label)
        .map(Detection::center)
        .collect()
}

/// First detection labelled `label`.
pub fn first(detections: &[Detection], label: Label) -> Option<&Detection> {
    detections.iter().find(|d| d.label == label)
}

/// Bottom point of the `label` detection closest to the image center column.
pub fn nearest_to_center(detections: &[Detection], label: Label) -> Option<Point> {
    let center = IMAGE_COLS / 2;
    detections
        .iter()
        .filter(|d| d.label == label)
        .filter(|d| (d.center().col - center).abs() < center)
        .min_by_key(|d| (d.center().col - center).abs())
        .map(Detection::bottom)
}
