use crate::workflow::runner::{CampusRun, SurveySummary, WorkflowResult};
use crate::workflow::config::WorkflowConfig;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use wifimapcore::processing::TargetMonth;
use wifimapcore::reference::{Building, PlacedObservation};
use wifimapcore::telemetry::PipelineCounts;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// One row of a placed table. Usage columns keep the input log's names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedRow {
    pub timestamp: String,
    #[serde(rename = "Floor")]
    pub usage_floor: Option<i32>,
    #[serde(rename = "User-Count")]
    pub user_count: u64,
    #[serde(rename = "WiFi-Conn")]
    pub wifi_conn: u64,
    #[serde(rename = "Duration-Sec")]
    pub duration_sec: f64,
    pub device_id: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub floor: Option<i32>,
    pub source: String,
    pub confidence: f64,
    pub time_window: Option<String>,
}

impl From<&PlacedObservation> for PlacedRow {
    fn from(record: &PlacedObservation) -> Self {
        let observation = &record.observation;
        let position = record.position();
        Self {
            timestamp: format_timestamp(observation.timestamp),
            usage_floor: observation.floor,
            user_count: observation.usage.user_count,
            wifi_conn: observation.usage.wifi_conn,
            duration_sec: observation.usage.duration_sec,
            device_id: observation.device_id.clone(),
            lat: position.map(|p| p.lat),
            lon: position.map(|p| p.lon),
            floor: record.floor,
            source: record.source().as_str().to_string(),
            confidence: record.confidence(),
            time_window: record.window_start.map(format_timestamp),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRow {
    #[serde(rename = "BuildingCode")]
    pub code: String,
    #[serde(rename = "BuildingName")]
    pub name: String,
    #[serde(rename = "BuildingType")]
    pub kind: String,
    pub num_access_points: usize,
    pub coord_x: f64,
    pub coord_y: f64,
    pub map_pixel_x: Option<i64>,
    pub map_pixel_y: Option<i64>,
}

impl From<&Building> for BuildingRow {
    fn from(building: &Building) -> Self {
        Self {
            code: building.code.clone(),
            name: building.name.clone(),
            kind: building.kind.clone(),
            num_access_points: building.access_points,
            coord_x: building.local_x,
            coord_y: building.local_y,
            map_pixel_x: building.pixel.map(|p| p.0),
            map_pixel_y: building.pixel.map(|p| p.1),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampusReport {
    pub slug: String,
    pub label: String,
    pub raw_rows: usize,
    pub deduplicated_rows: usize,
    pub counts: PipelineCounts,
}

impl From<&CampusRun> for CampusReport {
    fn from(run: &CampusRun) -> Self {
        Self {
            slug: run.slug.clone(),
            label: run.label.clone(),
            raw_rows: run.placed.len(),
            deduplicated_rows: run.deduplicated.len(),
            counts: run.counts.clone(),
        }
    }
}

/// Contents of `run_report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub tag: String,
    pub window: String,
    pub target: TargetMonth,
    pub survey: SurveySummary,
    pub buildings: Option<usize>,
    pub campuses: Vec<CampusReport>,
    pub outputs: Vec<String>,
}

impl RunReport {
    pub fn new(config: &WorkflowConfig, result: &WorkflowResult) -> Self {
        Self {
            tag: result.tag.clone(),
            window: config.window.to_string(),
            target: config.target,
            survey: result.survey.clone(),
            buildings: result.buildings.as_ref().map(Vec::len),
            campuses: result.campuses.iter().map(CampusReport::from).collect(),
            outputs: Vec::new(),
        }
    }
}
