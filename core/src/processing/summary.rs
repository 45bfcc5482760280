use crate::reference::placed::PlacedObservation;
use serde::{Deserialize, Serialize};

/// Usage totals for one campus label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampusTotals {
    #[serde(rename = "Campus")]
    pub campus: String,
    #[serde(rename = "User_Count")]
    pub user_count: u64,
    #[serde(rename = "WiFi_Conn")]
    pub wifi_conn: u64,
    #[serde(rename = "Duration_Sec")]
    pub duration_sec: f64,
}

impl CampusTotals {
    pub fn from_records(campus: impl Into<String>, records: &[PlacedObservation]) -> Self {
        let mut totals = Self {
            campus: campus.into(),
            user_count: 0,
            wifi_conn: 0,
            duration_sec: 0.0,
        };
        for record in records {
            let usage = record.observation.usage;
            totals.user_count += usage.user_count;
            totals.wifi_conn += usage.wifi_conn;
            totals.duration_sec += usage.duration_sec;
        }
        totals
    }
}

/// One row per distinct label, ordered by label. Repeated labels merge.
pub fn campus_totals<'a, I>(campuses: I) -> Vec<CampusTotals>
where
    I: IntoIterator<Item = (&'a str, &'a [PlacedObservation])>,
{
    let mut rows: Vec<CampusTotals> = Vec::new();
    for (label, records) in campuses {
        let totals = CampusTotals::from_records(label, records);
        match rows.iter_mut().find(|row| row.campus == label) {
            Some(row) => {
                row.user_count += totals.user_count;
                row.wifi_conn += totals.wifi_conn;
                row.duration_sec += totals.duration_sec;
            }
            None => rows.push(totals),
        }
    }
    rows.sort_by(|a, b| a.campus.cmp(&b.campus));
    rows
}
