use crate::export::model::{BuildingRow, PlacedRow, RunReport};
use crate::workflow::config::WorkflowConfig;
use crate::workflow::runner::WorkflowResult;
use anyhow::Context;
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const BUILDINGS_FILE: &str = "building_locations_processed.csv";
pub const REPORT_FILE: &str = "run_report.json";

pub fn raw_table_name(slug: &str, tag: &str) -> String {
    format!("{slug}_placed_raw_{tag}.csv")
}

pub fn dedup_table_name(slug: &str, tag: &str) -> String {
    format!("{slug}_placed_windowed_dedup_{tag}.csv")
}

pub fn totals_table_name(tag: &str) -> String {
    format!("{tag}_campus_monthly_totals.csv")
}

/// Writes every table of a run into one output directory.
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Returns the paths written, report last.
    pub fn write_all(
        &self,
        config: &WorkflowConfig,
        result: &WorkflowResult,
    ) -> anyhow::Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating output directory {}", self.out_dir.display()))?;

        let mut written = Vec::new();
        for run in &result.campuses {
            written.push(self.write_csv(
                &raw_table_name(&run.slug, &result.tag),
                run.placed.iter().map(PlacedRow::from),
            )?);
            written.push(self.write_csv(
                &dedup_table_name(&run.slug, &result.tag),
                run.deduplicated.iter().map(PlacedRow::from),
            )?);
        }
        written.push(self.write_csv(&totals_table_name(&result.tag), result.totals.iter())?);
        if let Some(buildings) = &result.buildings {
            written.push(self.write_csv(BUILDINGS_FILE, buildings.iter().map(BuildingRow::from))?);
        }

        let mut report = RunReport::new(config, result);
        report.outputs = written
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        written.push(self.write_report(&report)?);
        Ok(written)
    }

    fn write_csv<T, I>(&self, name: &str, rows: I) -> anyhow::Result<PathBuf>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let path = self.out_dir.join(name);
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut count = 0usize;
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("writing row {} of {}", count + 1, path.display()))?;
            count += 1;
        }
        writer
            .flush()
            .with_context(|| format!("flushing {}", path.display()))?;
        info!("wrote {} rows to {}", count, path.display());
        Ok(path)
    }

    fn write_report(&self, report: &RunReport) -> anyhow::Result<PathBuf> {
        let path = self.out_dir.join(REPORT_FILE);
        let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(file, report)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
