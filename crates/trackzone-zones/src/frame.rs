//! Per-frame edge snapshot handed to the zones.

use serde::{Deserialize, Serialize};
use trackzone_core::{mirror_edge, Point};

/// Edge pair plus the statistics the base extractor computes alongside it.
///
/// Index `0` of each edge is the bottom (nearest) row; rows decrease as the
/// index grows. The two edges are row-aligned: `left[i]` and `right[i]` sit
/// on the same image row as long as both exist.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackFrame {
    pub left: Vec<Point>,
    pub right: Vec<Point>,
    /// Slope spread of each edge, see [`trackzone_core::edge_slope_stdev`].
    pub stdev_left: f64,
    pub stdev_right: f64,
    pub valid_rows_left: usize,
    pub valid_rows_right: usize,
    /// Branch point candidates.
    pub spurroad: Vec<Point>,
}

impl TrackFrame {
    pub fn new(left: Vec<Point>, right: Vec<Point>) -> Self {
        let (valid_rows_left, valid_rows_right) = (left.len(), right.len());
        Self {
            left,
            right,
            valid_rows_left,
            valid_rows_right,
            ..Self::default()
        }
    }

    /// Track width on the row of `left[i]`, or `None` past either edge.
    #[inline]
    pub fn width_at(&self, i: usize) -> Option<i32> {
        Some(self.right.get(i)?.col - self.left.get(i)?.col)
    }

    /// Number of row-aligned width samples.
    #[inline]
    pub fn width_len(&self) -> usize {
        self.left.len().min(self.right.len())
    }

    #[inline]
    pub fn both_shorter_than(&self, n: usize) -> bool {
        self.left.len() < n && self.right.len() < n
    }

    #[inline]
    pub fn both_longer_than(&self, n: usize) -> bool {
        self.left.len() > n && self.right.len() > n
    }

    /// Reflect the frame across the vertical image axis.
    ///
    /// The left edge becomes the right one (and vice versa) together with
    /// its statistics, so right-hand situations can be handled by the
    /// left-hand logic and mirrored back.
    pub fn mirrored(&self) -> Self {
        let mut out = Self {
            left: self.right.clone(),
            right: self.left.clone(),
            stdev_left: self.stdev_right,
            stdev_right: self.stdev_left,
            valid_rows_left: self.valid_rows_right,
            valid_rows_right: self.valid_rows_left,
            spurroad: self.spurroad.clone(),
        };
        mirror_edge(&mut out.left);
        mirror_edge(&mut out.right);
        mirror_edge(&mut out.spurroad);
        out
    }

    /// Thin both edges to every other point.
    pub fn keep_every_other(&mut self) {
        for edge in [&mut self.left, &mut self.right] {
            let thinned: Vec<Point> = edge.iter().step_by(2).copied().collect();
            *edge = thinned;
        }
    }
}

/// Hook into the base edge extractor.
///
/// After a zone rewrites part of an edge it may ask the extractor to
/// search the remaining rows again, starting from edge index `from`.
pub trait TrackRetrace {
    fn retrace_from(&mut self, frame: &mut TrackFrame, from: usize);
}

/// Retrace used when no extractor is attached; the edges stay as they are.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetrace;

impl TrackRetrace for NoRetrace {
    fn retrace_from(&mut self, _frame: &mut TrackFrame, _from: usize) {}
}

/// Runs the wrapped retrace in un-mirrored image space.
pub(crate) struct MirroredRetrace<'a>(pub &'a mut dyn TrackRetrace);

impl TrackRetrace for MirroredRetrace<'_> {
    fn retrace_from(&mut self, frame: &mut TrackFrame, from: usize) {
        let mut real = frame.mirrored();
        self.0.retrace_from(&mut real, from);
        *frame = real.mirrored();
    }
}
