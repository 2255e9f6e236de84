mod bridge;
mod depot;
mod farmland;
mod garage;
mod intersection;
mod roundabout;
mod silo;
mod slowzone;

pub use bridge::{BridgeParams, BridgeState, BridgeZone};
pub use depot::{DepotParams, DepotPhase, DepotZone};
pub use farmland::{FarmlandParams, FarmlandState, FarmlandZone};
pub use garage::{GarageHeuristic, GarageParams, GarageState, GarageZone};
pub use intersection::{Approach, IntersectionParams, IntersectionZone};
pub use roundabout::{RoundaboutParams, RoundaboutState, RoundaboutZone};
pub use silo::{SiloParams, SiloState, SiloZone};
pub use slowzone::{SlowzoneParams, SlowzoneState, SlowzoneZone};
