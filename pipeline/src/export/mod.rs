//! CSV tables and the JSON run report written at the end of a run.

pub mod model;
pub mod tables;

pub use tables::Exporter;
