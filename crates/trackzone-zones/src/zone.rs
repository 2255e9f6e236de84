use serde::{Deserialize, Serialize};
use trackzone_core::{GrayImageView, PerspectiveMapping};

use crate::{Detection, TrackFrame, TrackRetrace};

/// Kinds of special track regions, in arbitration priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Garage,
    Farmland,
    Depot,
    Silo,
    Bridge,
    Slowzone,
    Roundabout,
    Intersection,
}

impl ZoneKind {
    pub const PRIORITY: [ZoneKind; 8] = [
        ZoneKind::Garage,
        ZoneKind::Farmland,
        ZoneKind::Depot,
        ZoneKind::Silo,
        ZoneKind::Bridge,
        ZoneKind::Slowzone,
        ZoneKind::Roundabout,
        ZoneKind::Intersection,
    ];

    /// Zones that drive on synthesized edges and are exempt from the
    /// out-of-track guard.
    #[inline]
    pub fn tolerates_lost_edges(self) -> bool {
        matches!(
            self,
            ZoneKind::Bridge | ZoneKind::Silo | ZoneKind::Depot | ZoneKind::Farmland
        )
    }
}

/// Read-only frame context plus the extractor hook.
pub struct ZoneInput<'a> {
    pub detections: &'a [Detection],
    /// Drivable-area mask from [`trackzone_core::path_search`].
    pub path: GrayImageView<'a>,
    pub mapping: &'a PerspectiveMapping,
    pub retrace: &'a mut dyn TrackRetrace,
}

/// A per-zone state machine.
///
/// `detect` is called once per frame while the zone is either active or a
/// candidate for activation. It may rewrite the edges of `frame` and returns
/// whether the zone is active for this frame.
pub trait Zone {
    fn kind(&self) -> ZoneKind;

    fn detect(&mut self, frame: &mut TrackFrame, input: &mut ZoneInput<'_>) -> bool;

    /// Return to the state right after construction.
    fn reset(&mut self);

    /// Speed reduction requested during the last `detect`.
    fn slow_down(&self) -> bool {
        false
    }
}
