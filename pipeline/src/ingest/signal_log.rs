use crate::ingest::{cell, Columns};
use anyhow::Context;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use wifimapcore::geo::point::GeoPoint;
use wifimapcore::prelude::DataQualityIssue;
use wifimapcore::reference::coerce::{coerce_coordinate, coerce_floor, coerce_timestamp};
use wifimapcore::reference::{Observation, Signal};
use wifimapcore::telemetry::MetricsRecorder;

struct SignalColumns {
    device: usize,
    timestamp: usize,
    floor: Option<usize>,
    ap: Option<usize>,
    rssi: Option<usize>,
    lat: Option<usize>,
    lon: Option<usize>,
}

struct SignalRow {
    device_id: String,
    timestamp: NaiveDateTime,
    floor: Option<i32>,
    gps: Option<GeoPoint>,
    signal: Option<Signal>,
}

impl SignalColumns {
    fn locate(headers: &StringRecord) -> anyhow::Result<Self> {
        let columns = Columns::from_headers(headers);
        Ok(Self {
            device: columns.require("device_id")?,
            timestamp: columns.require("timestamp")?,
            floor: columns.optional("floor"),
            ap: columns.optional("ap"),
            rssi: columns.optional("rssi"),
            lat: columns.optional("lat"),
            lon: columns.optional("lon"),
        })
    }

    fn text<'r>(row: &'r StringRecord, idx: Option<usize>) -> &'r str {
        idx.map(|idx| cell(row, idx)).unwrap_or("")
    }

    fn parse(&self, row: &StringRecord) -> Result<SignalRow, DataQualityIssue> {
        let device_id = cell(row, self.device);
        if device_id.is_empty() {
            return Err(DataQualityIssue::MissingField("device_id".into()));
        }
        let timestamp = coerce_timestamp(cell(row, self.timestamp))?;
        let floor = match Self::text(row, self.floor) {
            "" => None,
            raw => Some(coerce_floor(raw)?),
        };
        let lat = coerce_coordinate("lat", Self::text(row, self.lat))?;
        let lon = coerce_coordinate("lon", Self::text(row, self.lon))?;
        let ap = Self::text(row, self.ap);
        let rssi = coerce_coordinate("rssi", Self::text(row, self.rssi))?;
        let signal = match (ap.is_empty(), rssi) {
            (false, Some(rssi)) => Some(Signal::new(ap, rssi)),
            _ => None,
        };
        Ok(SignalRow {
            device_id: device_id.to_string(),
            timestamp,
            floor,
            gps: GeoPoint::from_parts(lat, lon),
            signal,
        })
    }
}

/// Folds per-AP sightings into one observation per (device, timestamp).
/// The first known floor and GPS fix of a group win.
pub fn read_signal_log<R: Read>(reader: R, metrics: &MetricsRecorder) -> anyhow::Result<Vec<Observation>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);
    let columns = SignalColumns::locate(csv.headers().context("reading signal log header")?)?;

    let mut grouped: BTreeMap<(String, NaiveDateTime), Observation> = BTreeMap::new();
    let mut valid = 0;
    for (line, row) in csv.records().enumerate() {
        let row = row.with_context(|| format!("reading signal log row {}", line + 1))?;
        metrics.record_input(1);
        let parsed = match columns.parse(&row) {
            Ok(parsed) => parsed,
            Err(issue) => {
                metrics.record_dropped(&issue);
                continue;
            }
        };
        valid += 1;

        let observation = grouped
            .entry((parsed.device_id.clone(), parsed.timestamp))
            .or_insert_with(|| Observation::new(parsed.device_id, parsed.timestamp));
        if observation.floor.is_none() {
            observation.floor = parsed.floor;
        }
        if observation.gps.is_none() {
            observation.gps = parsed.gps;
        }
        observation.signals.extend(parsed.signal);
    }
    metrics.record_valid(valid);

    Ok(grouped.into_values().collect())
}

pub fn load_signal_log(path: &Path, metrics: &MetricsRecorder) -> anyhow::Result<Vec<Observation>> {
    let file = File::open(path).with_context(|| format!("opening signal log {}", path.display()))?;
    read_signal_log(file, metrics).with_context(|| format!("parsing signal log {}", path.display()))
}
