//! Placement and calibration core for the campus Wi-Fi heatmap pipeline.
//!
//! Observations are resolved through a GPS, RSSI, floor-centroid fallback
//! chain, bucketed into time windows with one record kept per device and
//! window, and moved onto a shared target month. Local survey coordinates
//! are calibrated onto map pixels with a two-point transform.

pub mod geo;
pub mod prelude;
pub mod processing;
pub mod reference;
pub mod telemetry;

pub use prelude::{PipelineError, PipelineResult, ProcessingStage, StageInput, StageOutput};
