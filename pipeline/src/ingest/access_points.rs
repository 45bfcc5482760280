use crate::ingest::cell;
use anyhow::Context;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use wifimapcore::prelude::DataQualityIssue;
use wifimapcore::reference::ApRecord;
use wifimapcore::telemetry::MetricsRecorder;

/// Reads the AP survey positionally: name, x, y, floor. The survey header
/// splits its floor title across two columns, so names are not trusted.
pub fn read_ap_records<R: Read>(reader: R, metrics: &MetricsRecorder) -> anyhow::Result<Vec<ApRecord>> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line, row) in csv.records().enumerate() {
        let row = row.with_context(|| format!("reading AP survey row {}", line + 1))?;
        metrics.record_input(1);
        if row.len() < 4 {
            metrics.record_dropped(&DataQualityIssue::MissingField("floor".into()));
            continue;
        }
        match ApRecord::from_fields(cell(&row, 0), cell(&row, 1), cell(&row, 2), cell(&row, 3)) {
            Ok(record) => records.push(record),
            Err(issue) => metrics.record_dropped(&issue),
        }
    }
    metrics.record_valid(records.len());
    Ok(records)
}

pub fn load_ap_records(path: &Path, metrics: &MetricsRecorder) -> anyhow::Result<Vec<ApRecord>> {
    let file = File::open(path).with_context(|| format!("opening AP survey {}", path.display()))?;
    read_ap_records(file, metrics).with_context(|| format!("parsing AP survey {}", path.display()))
}
