//! CSV readers for the survey, usage and signal tables.

pub mod access_points;
pub mod signal_log;
pub mod usage_log;

use anyhow::anyhow;
use csv::StringRecord;
use std::collections::HashMap;

/// Header name to column index, matched after trimming.
pub struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    pub fn from_headers(headers: &StringRecord) -> Self {
        Self {
            index: headers
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.trim().to_string(), idx))
                .collect(),
        }
    }

    pub fn require(&self, name: &str) -> anyhow::Result<usize> {
        self.optional(name)
            .ok_or_else(|| anyhow!("missing required column {name:?}"))
    }

    pub fn optional(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

/// Cell text, empty when the row is short.
pub fn cell(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}
