use crate::geo::point::GeoPoint;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;

/// One access-point sighting: AP identifier and received strength in dBm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub ap_id: String,
    pub rssi_dbm: f64,
}

impl Signal {
    pub fn new(ap_id: impl Into<String>, rssi_dbm: f64) -> Self {
        Self {
            ap_id: ap_id.into(),
            rssi_dbm,
        }
    }
}

/// Source-specific usage counters carried through to the exports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub user_count: u64,
    pub wifi_conn: u64,
    pub duration_sec: f64,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.user_count += other.user_count;
        self.wifi_conn += other.wifi_conn;
        self.duration_sec += other.duration_sec;
    }
}

/// A single measurement record as ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub device_id: String,
    pub timestamp: NaiveDateTime,
    pub floor: Option<i32>,
    pub gps: Option<GeoPoint>,
    pub signals: Vec<Signal>,
    pub usage: Usage,
}

impl Observation {
    pub fn new(device_id: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp,
            floor: None,
            gps: None,
            signals: Vec::new(),
            usage: Usage::default(),
        }
    }

    pub fn with_floor(mut self, floor: i32) -> Self {
        self.floor = Some(floor);
        self
    }

    pub fn with_gps(mut self, lat: f64, lon: f64) -> Self {
        self.gps = GeoPoint::from_parts(Some(lat), Some(lon));
        self
    }

    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }
}
