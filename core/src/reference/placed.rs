use crate::geo::point::GeoPoint;
use crate::reference::observation::Observation;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which step of the fallback chain resolved a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementSource {
    Gps,
    Rssi,
    FloorOnly,
    Unplaced,
}

impl PlacementSource {
    pub const ALL: [PlacementSource; 4] = [
        PlacementSource::Gps,
        PlacementSource::Rssi,
        PlacementSource::FloorOnly,
        PlacementSource::Unplaced,
    ];

    pub fn confidence(self) -> f64 {
        match self {
            PlacementSource::Gps => 1.0,
            PlacementSource::Rssi => 0.7,
            PlacementSource::FloorOnly => 0.3,
            PlacementSource::Unplaced => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlacementSource::Gps => "gps",
            PlacementSource::Rssi => "rssi",
            PlacementSource::FloorOnly => "floor_only",
            PlacementSource::Unplaced => "unplaced",
        }
    }
}

impl fmt::Display for PlacementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved location; only `Unplaced` carries no coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    Gps(GeoPoint),
    Rssi(GeoPoint),
    FloorOnly(GeoPoint),
    Unplaced,
}

impl Placement {
    pub fn source(&self) -> PlacementSource {
        match self {
            Placement::Gps(_) => PlacementSource::Gps,
            Placement::Rssi(_) => PlacementSource::Rssi,
            Placement::FloorOnly(_) => PlacementSource::FloorOnly,
            Placement::Unplaced => PlacementSource::Unplaced,
        }
    }

    pub fn position(&self) -> Option<GeoPoint> {
        match *self {
            Placement::Gps(point) | Placement::Rssi(point) | Placement::FloorOnly(point) => {
                Some(point)
            }
            Placement::Unplaced => None,
        }
    }

    pub fn confidence(&self) -> f64 {
        self.source().confidence()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedObservation {
    pub observation: Observation,
    pub placement: Placement,
    pub floor: Option<i32>,
    pub window_start: Option<NaiveDateTime>,
}

impl PlacedObservation {
    pub fn new(observation: Observation, placement: Placement) -> Self {
        let floor = observation.floor;
        Self {
            observation,
            placement,
            floor,
            window_start: None,
        }
    }

    pub fn source(&self) -> PlacementSource {
        self.placement.source()
    }

    pub fn confidence(&self) -> f64 {
        self.placement.confidence()
    }

    pub fn position(&self) -> Option<GeoPoint> {
        self.placement.position()
    }
}

/// Number of records resolved by each chain step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub gps: usize,
    pub rssi: usize,
    pub floor_only: usize,
    pub unplaced: usize,
}

impl SourceCounts {
    pub fn record(&mut self, source: PlacementSource) {
        match source {
            PlacementSource::Gps => self.gps += 1,
            PlacementSource::Rssi => self.rssi += 1,
            PlacementSource::FloorOnly => self.floor_only += 1,
            PlacementSource::Unplaced => self.unplaced += 1,
        }
    }

    pub fn merge(&mut self, other: &SourceCounts) {
        self.gps += other.gps;
        self.rssi += other.rssi;
        self.floor_only += other.floor_only;
        self.unplaced += other.unplaced;
    }

    pub fn total(&self) -> usize {
        self.gps + self.rssi + self.floor_only + self.unplaced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_strictly_ordered_by_source() {
        let confidences: Vec<f64> = PlacementSource::ALL
            .iter()
            .map(|source| source.confidence())
            .collect();
        assert_eq!(confidences, vec![1.0, 0.7, 0.3, 0.0]);
        assert!(confidences.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn only_unplaced_lacks_coordinates() {
        let point = GeoPoint::new(43.7, -72.29);
        assert!(Placement::Gps(point).position().is_some());
        assert!(Placement::Rssi(point).position().is_some());
        assert!(Placement::FloorOnly(point).position().is_some());
        assert!(Placement::Unplaced.position().is_none());
    }

    #[test]
    fn source_tags_serialize_in_snake_case() {
        let json = serde_json::to_string(&PlacementSource::FloorOnly).unwrap();
        assert_eq!(json, "\"floor_only\"");
        assert_eq!(PlacementSource::FloorOnly.to_string(), "floor_only");
    }
}
