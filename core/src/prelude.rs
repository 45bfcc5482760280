use crate::processing::remap::TargetMonth;
use crate::processing::signal::SignalModel;
use crate::processing::window::WindowSpec;
use crate::reference::placed::SourceCounts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shared configuration for each processing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub window: WindowSpec,
    pub target: TargetMonth,
    pub signal: SignalModel,
}

/// Input payload for a processing stage.
#[derive(Debug, Clone)]
pub struct StageInput<T> {
    pub records: Vec<T>,
    pub label: Option<String>,
}

impl<T> StageInput<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            records,
            label: None,
        }
    }

    pub fn labelled(records: Vec<T>, label: impl Into<String>) -> Self {
        Self {
            records,
            label: Some(label.into()),
        }
    }
}

/// Output produced by each stage.
#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub records: Vec<T>,
    pub metadata: StageMetadata,
}

/// Metadata used for chaining stages and telemetry.
#[derive(Debug, Clone, Default)]
pub struct StageMetadata {
    pub source_counts: Option<SourceCounts>,
    pub removed: Option<usize>,
    pub missing_reference: Option<usize>,
    pub notes: Vec<String>,
}

/// Structural failures that abort a run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("degenerate calibration: reference points share the same source {axis} coordinate")]
    DegenerateCalibration { axis: &'static str },
    #[error("calibration drift at reference {reference}: {error:.2} units exceeds tolerance {tolerance:.2}")]
    CalibrationDrift {
        reference: usize,
        error: f64,
        tolerance: f64,
    },
    #[error("missing required input files: {}", join_paths(.0))]
    MissingInputs(Vec<PathBuf>),
    #[error("internal failure: {0}")]
    Internal(String),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type PipelineResult<T> = Result<T, PipelineError>;
pub type StageResult<T> = PipelineResult<T>;

/// Per-row problems. Rows carrying one are dropped and counted, never fatal.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DataQualityIssue {
    #[error("missing field {0}")]
    MissingField(String),
    #[error("non-numeric floor {0:?}")]
    NonNumericFloor(String),
    #[error("non-numeric {field} coordinate {value:?}")]
    NonNumericCoordinate { field: String, value: String },
    #[error("non-numeric {field} counter {value:?}")]
    NonNumericCounter { field: String, value: String },
    #[error("unparseable timestamp {0:?}")]
    InvalidTimestamp(String),
}

/// Trait describing the record-oriented pipeline stages.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()>;
    fn execute(&mut self, input: StageInput<Self::Input>)
        -> StageResult<StageOutput<Self::Output>>;
    fn cleanup(&mut self);
}
