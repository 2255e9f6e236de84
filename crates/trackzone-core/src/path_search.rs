//! Drivable-area segmentation of a binary track image.
//!
//! The largest bright connected region is taken as the track. Its outer
//! boundary is painted into an empty mask and the inside is flood-filled
//! from a seed near the bottom of the frame.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{GrayImage, GrayImageView, Point};

/// Value of boundary pixels in [`PathSearchResult::mask`].
pub const BOUNDARY: u8 = 128;
/// Value of filled pixels in [`PathSearchResult::mask`].
pub const FILLED: u8 = 255;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSearchParams {
    /// Pixels strictly above this value count as track.
    pub threshold: u8,
    /// Row of the seed probes.
    pub probe_row: i32,
    /// Probe columns, tried in order.
    pub probe_cols: Vec<i32>,
    /// Seed used when no probe hits track.
    pub fallback_seed: Point,
    /// Step applied when the seed sits on the boundary.
    pub nudge: i32,
    /// Upper bound on nudges before the fill is skipped.
    pub max_nudges: usize,
}

impl Default for PathSearchParams {
    fn default() -> Self {
        Self {
            threshold: 128,
            probe_row: 220,
            probe_cols: vec![160, 60, 260],
            fallback_seed: Point::new(220, 60),
            nudge: 5,
            max_nudges: 8,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PathSearchResult {
    /// `0` outside, [`BOUNDARY`] on the region outline, [`FILLED`] inside.
    pub mask: GrayImage,
    pub seed: Point,
    pub nudges: usize,
    /// `false` when the seed was still on the boundary after all nudges and
    /// no fill was performed.
    pub seed_settled: bool,
}

const NEIGHBORS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

fn largest_region(img: &GrayImageView<'_>, threshold: u8) -> Vec<bool> {
    let (w, h) = (img.width, img.height);
    let mut label = vec![0u32; w * h];
    let mut best = (0u32, 0usize);
    let mut next = 1u32;
    let mut queue = VecDeque::new();

    for start in 0..w * h {
        if label[start] != 0 || img.data.get(start).copied().unwrap_or(0) <= threshold {
            continue;
        }
        let mut area = 0usize;
        label[start] = next;
        queue.push_back(start);
        while let Some(idx) = queue.pop_front() {
            area += 1;
            let (r, c) = ((idx / w) as i32, (idx % w) as i32);
            for (dr, dc) in NEIGHBORS {
                let (nr, nc) = (r + dr, c + dc);
                if nr < 0 || nc < 0 || nr as usize >= h || nc as usize >= w {
                    continue;
                }
                let n = nr as usize * w + nc as usize;
                if label[n] == 0 && img.data[n] > threshold {
                    label[n] = next;
                    queue.push_back(n);
                }
            }
        }
        if area > best.1 {
            best = (next, area);
        }
        next += 1;
    }

    label.iter().map(|&l| l != 0 && l == best.0).collect()
}

fn paint_boundary(region: &[bool], width: usize, height: usize) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for r in 0..height as i32 {
        for c in 0..width as i32 {
            if !region[r as usize * width + c as usize] {
                continue;
            }
            let on_edge = NEIGHBORS.iter().any(|(dr, dc)| {
                let (nr, nc) = (r + dr, c + dc);
                nr < 0
                    || nc < 0
                    || nr as usize >= height
                    || nc as usize >= width
                    || !region[nr as usize * width + nc as usize]
            });
            if on_edge {
                mask.set(r, c, BOUNDARY);
            }
        }
    }
    mask
}

fn flood_fill(mask: &mut GrayImage, seed: Point) {
    if mask.get(seed.row, seed.col) != 0 {
        return;
    }
    let mut queue = VecDeque::from([seed]);
    mask.set(seed.row, seed.col, FILLED);
    while let Some(p) = queue.pop_front() {
        for (dr, dc) in NEIGHBORS {
            let (nr, nc) = (p.row + dr, p.col + dc);
            if nr < 0 || nc < 0 || nr as usize >= mask.height || nc as usize >= mask.width {
                continue;
            }
            if mask.get(nr, nc) == 0 {
                mask.set(nr, nc, FILLED);
                queue.push_back(Point::new(nr, nc));
            }
        }
    }
}

/// Segment the drivable area of `binary`.
pub fn path_search(binary: &GrayImageView<'_>, params: &PathSearchParams) -> PathSearchResult {
    let mut seed = params
        .probe_cols
        .iter()
        .map(|&c| Point::new(params.probe_row, c))
        .find(|p| binary.get(p.row, p.col) > params.threshold)
        .unwrap_or(params.fallback_seed);

    let region = largest_region(binary, params.threshold);
    let mut mask = paint_boundary(&region, binary.width, binary.height);

    let center = binary.width as i32 / 2;
    let mut nudges = 0;
    while mask.get(seed.row, seed.col) == BOUNDARY && nudges < params.max_nudges {
        let dc = if seed.col < center {
            params.nudge
        } else {
            -params.nudge
        };
        seed = Point::new(seed.row + params.nudge, seed.col + dc);
        nudges += 1;
    }

    let seed_settled = mask.get(seed.row, seed.col) != BOUNDARY;
    if seed_settled {
        flood_fill(&mut mask, seed);
    } else {
        log::warn!("path search seed stuck on the track boundary at {seed:?}");
    }

    PathSearchResult {
        mask,
        seed,
        nudges,
        seed_settled,
    }
}
