use crate::prelude::DataQualityIssue;
use crate::reference::placed::SourceCounts;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Counts reported for one run of one campus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineCounts {
    pub input: usize,
    pub valid: usize,
    pub dropped: usize,
    pub missing_reference: usize,
    pub placed: SourceCounts,
    pub deduplicated: usize,
}

pub struct MetricsRecorder {
    inner: Mutex<PipelineCounts>,
    logger: LogManager,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PipelineCounts::default()),
            logger: LogManager::new("metrics"),
        }
    }

    pub fn record_input(&self, rows: usize) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.input += rows;
        }
    }

    pub fn record_valid(&self, rows: usize) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.valid += rows;
        }
    }

    pub fn record_dropped(&self, issue: &DataQualityIssue) {
        self.logger.detail(&format!("dropping row: {}", issue));
        if let Ok(mut counts) = self.inner.lock() {
            counts.dropped += 1;
        }
    }

    pub fn record_missing_reference(&self, rows: usize) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.missing_reference += rows;
        }
    }

    pub fn record_placements(&self, placed: &SourceCounts) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.placed.merge(placed);
        }
    }

    pub fn record_deduplicated(&self, rows: usize) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.deduplicated += rows;
        }
    }

    pub fn snapshot(&self) -> PipelineCounts {
        if let Ok(counts) = self.inner.lock() {
            counts.clone()
        } else {
            PipelineCounts::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
