pub mod placement;
pub mod remap;
pub mod signal;
pub mod summary;
pub mod window;

pub use placement::{place_observation, PlacementStage};
pub use remap::{RemapStage, TargetMonth};
pub use signal::SignalModel;
pub use summary::{campus_totals, CampusTotals};
pub use window::{deduplicate, WindowSpec, WindowStage};
