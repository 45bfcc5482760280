use crate::prelude::{
    PipelineError, PipelineResult, ProcessingStage, StageConfig, StageInput, StageMetadata,
    StageOutput, StageResult,
};
use crate::processing::window::WindowSpec;
use crate::reference::placed::PlacedObservation;
use crate::telemetry::log::LogManager;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Month every timestamp is moved into so campuses share one timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMonth {
    pub year: i32,
    pub month: u32,
}

impl TargetMonth {
    pub fn new(year: i32, month: u32) -> PipelineResult<Self> {
        let target = Self { year, month };
        target.last_day()?;
        Ok(target)
    }

    fn first_day(&self) -> PipelineResult<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).ok_or_else(|| {
            PipelineError::Configuration(format!(
                "invalid target month {}-{:02}",
                self.year, self.month
            ))
        })
    }

    pub fn last_day(&self) -> PipelineResult<u32> {
        let first = self.first_day()?;
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|next| next.pred_opt())
            .map(|last| last.day())
            .ok_or_else(|| {
                PipelineError::Configuration(format!("target month {} has no successor", first))
            })
    }

    /// Short lowercase label such as `jan2015`, used in output file names.
    pub fn tag(&self) -> PipelineResult<String> {
        Ok(self.first_day()?.format("%b%Y").to_string().to_lowercase())
    }

    /// Same day (clamped to the month's length) and time of day, in the
    /// target year and month.
    pub fn remap(&self, timestamp: NaiveDateTime) -> PipelineResult<NaiveDateTime> {
        let day = timestamp.day().min(self.last_day()?);
        NaiveDate::from_ymd_opt(self.year, self.month, day)
            .map(|date| date.and_time(timestamp.time()))
            .ok_or_else(|| {
                PipelineError::Internal(format!(
                    "day {} missing from {}-{:02}",
                    day, self.year, self.month
                ))
            })
    }
}

impl Default for TargetMonth {
    fn default() -> Self {
        Self {
            year: 2015,
            month: 1,
        }
    }
}

/// Moves each record's timestamp. A record already windowed gets its window
/// start recomputed from the moved timestamp, so it never follows it.
pub fn remap_records(
    records: Vec<PlacedObservation>,
    target: TargetMonth,
    window: WindowSpec,
) -> PipelineResult<Vec<PlacedObservation>> {
    records
        .into_iter()
        .map(|mut record| -> PipelineResult<PlacedObservation> {
            let timestamp = target.remap(record.observation.timestamp)?;
            record.observation.timestamp = timestamp;
            if record.window_start.is_some() {
                record.window_start = Some(window.window_start(timestamp));
            }
            Ok(record)
        })
        .collect()
}

pub struct RemapStage {
    config: Option<StageConfig>,
    logger: LogManager,
}

impl RemapStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("remap"),
        }
    }
}

impl Default for RemapStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for RemapStage {
    type Input = PlacedObservation;
    type Output = PlacedObservation;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        config.target.last_day()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(
        &mut self,
        input: StageInput<PlacedObservation>,
    ) -> StageResult<StageOutput<PlacedObservation>> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PipelineError::Internal("stage not initialized".into()))?;

        let target = config.target;
        let records = remap_records(input.records, target, config.window)?;
        self.logger.record(&format!(
            "{}: remapped {} records into {}-{:02}",
            input.label.as_deref().unwrap_or("batch"),
            records.len(),
            target.year,
            target.month
        ));

        let metadata = StageMetadata {
            notes: vec![format!("target {}-{:02}", target.year, target.month)],
            ..Default::default()
        };
        Ok(StageOutput { records, metadata })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}
