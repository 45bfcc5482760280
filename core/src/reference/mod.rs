pub mod access_point;
pub mod building;
pub mod coerce;
pub mod observation;
pub mod placed;

pub use access_point::{AccessPoint, AccessPointLookup, ApRecord, FloorCentroids, ReferenceTables};
pub use building::{Building, BuildingAnchor, BuildingCode};
pub use observation::{Observation, Signal, Usage};
pub use placed::{PlacedObservation, Placement, PlacementSource, SourceCounts};
