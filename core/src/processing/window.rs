use crate::prelude::{
    PipelineError, PipelineResult, ProcessingStage, StageConfig, StageInput, StageMetadata,
    StageOutput, StageResult,
};
use crate::reference::placed::PlacedObservation;
use crate::telemetry::log::LogManager;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Fixed window length. Parses pandas-style aliases such as `1D`, `5T`,
/// `30min`, `2h` and `45s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WindowSpec {
    seconds: i64,
}

impl WindowSpec {
    pub fn from_seconds(seconds: i64) -> PipelineResult<Self> {
        if seconds <= 0 {
            return Err(PipelineError::Configuration(format!(
                "window length must be positive, got {seconds}s"
            )));
        }
        Ok(Self { seconds })
    }

    pub fn days(days: u32) -> PipelineResult<Self> {
        Self::from_seconds(i64::from(days) * DAY)
    }

    pub fn parse(raw: &str) -> PipelineResult<Self> {
        let trimmed = raw.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (count, unit) = trimmed.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| {
                PipelineError::Configuration(format!("window {raw:?} has an invalid count"))
            })?
        };
        let unit_seconds = match unit.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => DAY,
            "h" | "hour" | "hours" => HOUR,
            "t" | "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
            "s" | "sec" | "secs" | "second" | "seconds" => 1,
            other => {
                return Err(PipelineError::Configuration(format!(
                    "window {raw:?} has unknown unit {other:?}"
                )))
            }
        };
        let seconds = count.checked_mul(unit_seconds).ok_or_else(|| {
            PipelineError::Configuration(format!("window {raw:?} overflows"))
        })?;
        Self::from_seconds(seconds)
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Start of the window containing `timestamp`, by floor division of the
    /// naive epoch time.
    pub fn window_start(&self, timestamp: NaiveDateTime) -> NaiveDateTime {
        let epoch = timestamp.and_utc().timestamp();
        let start = epoch.div_euclid(self.seconds) * self.seconds;
        DateTime::from_timestamp(start, 0)
            .map(|dt| dt.naive_utc())
            .unwrap_or(timestamp)
    }
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self { seconds: DAY }
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.seconds;
        if seconds % DAY == 0 {
            write!(f, "{}D", seconds / DAY)
        } else if seconds % HOUR == 0 {
            write!(f, "{}h", seconds / HOUR)
        } else if seconds % MINUTE == 0 {
            write!(f, "{}min", seconds / MINUTE)
        } else {
            write!(f, "{}s", seconds)
        }
    }
}

impl TryFrom<String> for WindowSpec {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WindowSpec> for String {
    fn from(value: WindowSpec) -> Self {
        value.to_string()
    }
}

/// Keeps one record per (entity, window): the highest confidence, ties going
/// to the earliest input. Output is ordered by entity then window.
pub fn deduplicate_by<F>(
    records: Vec<PlacedObservation>,
    window: WindowSpec,
    entity: F,
) -> Vec<PlacedObservation>
where
    F: Fn(&PlacedObservation) -> &str,
{
    let mut windowed: Vec<PlacedObservation> = records
        .into_iter()
        .map(|mut record| {
            record.window_start = Some(window.window_start(record.observation.timestamp));
            record
        })
        .collect();

    // `sort_by` is stable, so equal keys keep input order.
    windowed.sort_by(|a, b| {
        entity(a)
            .cmp(entity(b))
            .then_with(|| a.window_start.cmp(&b.window_start))
            .then_with(|| {
                b.confidence()
                    .partial_cmp(&a.confidence())
                    .unwrap_or(Ordering::Equal)
            })
    });
    windowed.dedup_by(|later, kept| {
        entity(later) == entity(kept) && later.window_start == kept.window_start
    });
    windowed
}

pub fn deduplicate(records: Vec<PlacedObservation>, window: WindowSpec) -> Vec<PlacedObservation> {
    deduplicate_by(records, window, |record| record.observation.device_id.as_str())
}

pub struct WindowStage {
    config: Option<StageConfig>,
    logger: LogManager,
}

impl WindowStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("window"),
        }
    }
}

impl Default for WindowStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for WindowStage {
    type Input = PlacedObservation;
    type Output = PlacedObservation;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
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

        let before = input.records.len();
        let records = deduplicate(input.records, config.window);
        let removed = before - records.len();
        self.logger.record(&format!(
            "{}: {} -> {} records over {} windows",
            input.label.as_deref().unwrap_or("batch"),
            before,
            records.len(),
            config.window
        ));

        let metadata = StageMetadata {
            removed: Some(removed),
            notes: vec![format!("window {}", config.window)],
            ..Default::default()
        };
        Ok(StageOutput { records, metadata })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::point::GeoPoint;
    use crate::reference::observation::Observation;
    use crate::reference::placed::Placement;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn placed(device: &str, timestamp: NaiveDateTime, placement: Placement) -> PlacedObservation {
        PlacedObservation::new(Observation::new(device, timestamp), placement)
    }

    fn point() -> GeoPoint {
        GeoPoint::new(43.70, -72.29)
    }

    #[test]
    fn parses_window_aliases() {
        assert_eq!(WindowSpec::parse("1D").unwrap().seconds(), 86_400);
        assert_eq!(WindowSpec::parse("5T").unwrap().seconds(), 300);
        assert_eq!(WindowSpec::parse("30min").unwrap().seconds(), 1_800);
        assert_eq!(WindowSpec::parse("h").unwrap().seconds(), 3_600);
        assert!(WindowSpec::parse("0D").is_err());
        assert!(matches!(
            WindowSpec::days(0),
            Err(PipelineError::Configuration(_))
        ));
        assert_eq!(WindowSpec::days(7).unwrap().seconds(), 7 * DAY);
        assert!(WindowSpec::parse("3fortnights").is_err());
        assert_eq!(WindowSpec::parse("5T").unwrap().to_string(), "5min");
    }

    #[test]
    fn window_start_floors_to_the_bucket() {
        let five_minutes = WindowSpec::parse("5T").unwrap();
        assert_eq!(five_minutes.window_start(at(3, 10, 7)), at(3, 10, 5));
        assert_eq!(WindowSpec::default().window_start(at(3, 23, 59)), at(3, 0, 0));
    }

    #[test]
    fn highest_confidence_survives_each_group() {
        let records = vec![
            placed("dev", at(4, 1, 0), Placement::FloorOnly(point())),
            placed("dev", at(4, 9, 0), Placement::Gps(point())),
            placed("dev", at(4, 12, 0), Placement::Unplaced),
            placed("dev", at(5, 8, 0), Placement::Unplaced),
        ];
        let deduped = deduplicate(records, WindowSpec::default());
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].observation.timestamp, at(4, 9, 0));
        assert_eq!(deduped[0].window_start, Some(at(4, 0, 0)));
        assert_eq!(deduped[1].window_start, Some(at(5, 0, 0)));
    }

    #[test]
    fn ties_go_to_the_earliest_input() {
        let records = vec![
            placed("dev", at(4, 15, 0), Placement::FloorOnly(point())),
            placed("dev", at(4, 3, 0), Placement::FloorOnly(point())),
        ];
        let deduped = deduplicate(records, WindowSpec::default());
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].observation.timestamp, at(4, 15, 0));
    }

    #[test]
    fn output_is_ordered_by_entity_then_window() {
        let records = vec![
            placed("b", at(6, 0, 0), Placement::Unplaced),
            placed("a", at(7, 0, 0), Placement::Unplaced),
            placed("a", at(6, 0, 0), Placement::Unplaced),
        ];
        let deduped = deduplicate(records, WindowSpec::default());
        let keys: Vec<(&str, u32)> = deduped
            .iter()
            .map(|r| {
                (
                    r.observation.device_id.as_str(),
                    chrono::Datelike::day(&r.observation.timestamp),
                )
            })
            .collect();
        assert_eq!(keys, vec![("a", 6), ("a", 7), ("b", 6)]);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let records = vec![
            placed("x", at(1, 1, 0), Placement::Rssi(point())),
            placed("x", at(1, 2, 0), Placement::Gps(point())),
            placed("y", at(1, 2, 0), Placement::Unplaced),
            placed("y", at(2, 2, 0), Placement::FloorOnly(point())),
        ];
        let once = deduplicate(records, WindowSpec::default());
        let twice = deduplicate(once.clone(), WindowSpec::default());
        assert_eq!(once, twice);
    }

    #[test]
    fn custom_entity_key_groups_across_devices() {
        let records = vec![
            placed("dart_f1_2015-01-04", at(4, 0, 0), Placement::Unplaced),
            placed("dart_f1_2015-01-04b", at(4, 6, 0), Placement::FloorOnly(point())),
        ];
        let deduped = deduplicate_by(records, WindowSpec::default(), |_| "campus");
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].confidence(), 0.3);
    }

    #[test]
    fn stage_reports_removed_rows() {
        let mut stage = WindowStage::new();
        stage
            .initialize(&StageConfig {
                window: WindowSpec::default(),
                target: crate::processing::remap::TargetMonth::new(2015, 1).unwrap(),
                signal: Default::default(),
            })
            .unwrap();
        let output = stage
            .execute(StageInput::new(vec![
                placed("dev", at(4, 1, 0), Placement::Unplaced),
                placed("dev", at(4, 2, 0), Placement::Unplaced),
            ]))
            .unwrap();
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.metadata.removed, Some(1));
        stage.cleanup();
    }
}
