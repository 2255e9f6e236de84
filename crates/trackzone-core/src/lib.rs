//! Geometric building blocks for lane-edge repair.
//!
//! Integer image points, Bezier synthesis, edge statistics and the
//! camera/bird's-eye homography. Nothing here knows about track zones; the
//! state machines live in `trackzone-zones`.

mod bezier;
mod homography;
mod image;
mod logger;
mod path_search;
mod perspective;
mod point;
mod stats;

pub use bezier::{bezier, bezier_clamped, Bezier, BezierError, BezierIter};
pub use homography::{estimate_homography, homography_from_4pt, Homography};
pub use image::{GrayImage, GrayImageView};
pub use path_search::{path_search, PathSearchParams, PathSearchResult, BOUNDARY, FILLED};
pub use perspective::{MappingError, PerspectiveMapping, PerspectiveParams};
pub use point::{clamp_edge, mirror_edge, Point, Side, IMAGE_COLS, IMAGE_ROWS, TOP_COLS, TOP_ROWS};
pub use stats::{
    column_variance, distance, distance_to_line, edge_slope_stdev, mean, variance,
    SLOPE_STDEV_UNKNOWN,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_from_env, init_with_level, parse_level, LOG_ENV};
