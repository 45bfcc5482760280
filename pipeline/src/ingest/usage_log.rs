use crate::ingest::{cell, Columns};
use crate::workflow::config::CampusConfig;
use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use wifimapcore::prelude::DataQualityIssue;
use wifimapcore::processing::TargetMonth;
use wifimapcore::reference::coerce::{coerce_count, coerce_duration, coerce_floor, coerce_timestamp};
use wifimapcore::reference::{Observation, Usage};
use wifimapcore::telemetry::MetricsRecorder;

pub const DATE_COLUMN: &str = "Date";
pub const FLOOR_COLUMN: &str = "Floor";
pub const USER_COUNT_COLUMN: &str = "User-Count";
pub const WIFI_CONN_COLUMN: &str = "WiFi-Conn";
pub const DURATION_COLUMN: &str = "Duration-Sec";

struct UsageColumns {
    date: usize,
    floor: usize,
    user_count: usize,
    wifi_conn: usize,
    duration: usize,
}

impl UsageColumns {
    fn locate(headers: &StringRecord) -> anyhow::Result<Self> {
        let columns = Columns::from_headers(headers);
        Ok(Self {
            date: columns.require(DATE_COLUMN)?,
            floor: columns.require(FLOOR_COLUMN)?,
            user_count: columns.require(USER_COUNT_COLUMN)?,
            wifi_conn: columns.require(WIFI_CONN_COLUMN)?,
            duration: columns.require(DURATION_COLUMN)?,
        })
    }

    fn parse(&self, row: &StringRecord) -> Result<(NaiveDateTime, i32, Usage), DataQualityIssue> {
        let timestamp = coerce_timestamp(cell(row, self.date))?;
        let floor = coerce_floor(cell(row, self.floor))?;
        let usage = Usage {
            user_count: coerce_count(USER_COUNT_COLUMN, cell(row, self.user_count))?,
            wifi_conn: coerce_count(WIFI_CONN_COLUMN, cell(row, self.wifi_conn))?,
            duration_sec: coerce_duration(DURATION_COLUMN, cell(row, self.duration))?,
        };
        Ok((timestamp, floor, usage))
    }
}

/// `{prefix}_f{floor}_{YYYY-MM-DD}`.
pub fn device_id(prefix: &str, floor: i32, date: NaiveDate) -> String {
    format!("{}_f{}_{}", prefix, floor, date)
}

/// Reads a floor/day usage log into observations. With `campus.aggregate`
/// rows sharing (Date, Floor) are summed first, in key order. Device ids
/// carry the date as moved into `target`; timestamps stay as read.
pub fn read_usage_log<R: Read>(
    reader: R,
    campus: &CampusConfig,
    target: TargetMonth,
    metrics: &MetricsRecorder,
) -> anyhow::Result<Vec<Observation>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let columns = UsageColumns::locate(csv.headers().context("reading usage log header")?)?;

    let mut rows = Vec::new();
    for (line, row) in csv.records().enumerate() {
        let row = row.with_context(|| format!("reading usage log row {}", line + 1))?;
        metrics.record_input(1);
        match columns.parse(&row) {
            Ok(parsed) => rows.push(parsed),
            Err(issue) => metrics.record_dropped(&issue),
        }
    }
    metrics.record_valid(rows.len());

    if campus.aggregate {
        let mut grouped: BTreeMap<(NaiveDateTime, i32), Usage> = BTreeMap::new();
        for (timestamp, floor, usage) in rows {
            *grouped.entry((timestamp, floor)).or_default() += usage;
        }
        rows = grouped
            .into_iter()
            .map(|((timestamp, floor), usage)| (timestamp, floor, usage))
            .collect();
    }

    let mut observations = Vec::with_capacity(rows.len());
    for (timestamp, floor, usage) in rows {
        let day = target.remap(timestamp)?.date();
        observations.push(
            Observation::new(device_id(&campus.id_prefix, floor, day), timestamp)
                .with_floor(floor)
                .with_usage(usage),
        );
    }
    Ok(observations)
}

pub fn load_usage_log(
    path: &Path,
    campus: &CampusConfig,
    target: TargetMonth,
    metrics: &MetricsRecorder,
) -> anyhow::Result<Vec<Observation>> {
    let file = File::open(path).with_context(|| format!("opening usage log {}", path.display()))?;
    read_usage_log(file, campus, target, metrics)
        .with_context(|| format!("parsing usage log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::WorkflowConfig;

    const RAW_LOG: &str = "Date,Floor,User-Count,WiFi-Conn,Duration-Sec,AP\n\
2021-01-04,2,3,5,120,HK-AP-1\n\
2021-01-04,2,1,2,30.5,HK-AP-2\n\
2021-01-04,,4,4,10,HK-AP-3\n\
2021-01-05,3.0,2,2,60,HK-AP-4\n\
someday,3,1,1,1,HK-AP-5\n";

    fn campus(aggregate: bool) -> CampusConfig {
        let mut campus = WorkflowConfig::default().campuses[1].clone();
        campus.aggregate = aggregate;
        campus
    }

    #[test]
    fn aggregates_rows_per_date_and_floor() {
        let metrics = MetricsRecorder::new();
        let observations =
            read_usage_log(RAW_LOG.as_bytes(), &campus(true), TargetMonth::default(), &metrics)
                .unwrap();
        assert_eq!(observations.len(), 2);

        let first = &observations[0];
        assert_eq!(first.device_id, "hk_f2_2015-01-04");
        assert_eq!(first.timestamp.date().to_string(), "2021-01-04");
        assert_eq!(first.floor, Some(2));
        assert_eq!(first.usage.user_count, 4);
        assert_eq!(first.usage.wifi_conn, 7);
        assert_eq!(first.usage.duration_sec, 150.5);
        assert_eq!(observations[1].device_id, "hk_f3_2015-01-05");

        let counts = metrics.snapshot();
        assert_eq!((counts.input, counts.valid, counts.dropped), (5, 3, 2));
    }

    #[test]
    fn keeps_rows_as_read_without_aggregation() {
        let metrics = MetricsRecorder::new();
        let observations =
            read_usage_log(RAW_LOG.as_bytes(), &campus(false), TargetMonth::default(), &metrics)
                .unwrap();
        assert_eq!(observations.len(), 3);
        assert_eq!(observations[0].device_id, observations[1].device_id);
        assert!(observations.iter().all(|obs| obs.gps.is_none() && obs.signals.is_empty()));
    }

    #[test]
    fn device_ids_use_the_clamped_target_date() {
        let log = "Date,Floor,User-Count,WiFi-Conn,Duration-Sec\n2021-01-31,4,1,1,10\n";
        let metrics = MetricsRecorder::new();
        let april = TargetMonth::new(2015, 4).unwrap();
        let observations = read_usage_log(log.as_bytes(), &campus(false), april, &metrics).unwrap();
        assert_eq!(observations[0].device_id, "hk_f4_2015-04-30");
    }

    #[test]
    fn missing_column_is_fatal() {
        let metrics = MetricsRecorder::new();
        let err = read_usage_log(
            "Date,Floor\n2015-01-01,1\n".as_bytes(),
            &campus(false),
            TargetMonth::default(),
            &metrics,
        )
        .unwrap_err();
        assert!(err.to_string().contains("User-Count"));
    }
}
