pub mod calibration;
pub mod point;
pub mod stats;
pub mod synthetic;

pub use calibration::{AxisMap, CalibrationTransform, ReferencePair};
pub use point::{BoundingBox, GeoPoint};
pub use stats::StatsHelper;
pub use synthetic::SyntheticPlacer;
