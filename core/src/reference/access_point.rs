use crate::geo::point::GeoPoint;
use crate::geo::stats::StatsHelper;
use crate::geo::synthetic::SyntheticPlacer;
use crate::prelude::DataQualityIssue;
use crate::reference::coerce::{coerce_coordinate, coerce_floor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coordinate value the AP survey uses for "unknown".
pub const UNKNOWN_COORDINATE_SENTINEL: f64 = -1.0;

/// One row of the access-point survey in its local coordinate frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApRecord {
    pub name: String,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub floor: Option<i32>,
}

impl ApRecord {
    /// Coerces raw survey cells. Unknown coordinates and non-numeric floors
    /// become `None`; a non-numeric coordinate rejects the row. The survey's
    /// `99` floor is kept as an ordinary floor number.
    pub fn from_fields(name: &str, x: &str, y: &str, floor: &str) -> Result<Self, DataQualityIssue> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DataQualityIssue::MissingField("AP".into()));
        }
        let known = |value: Option<f64>| value.filter(|v| *v != UNKNOWN_COORDINATE_SENTINEL);
        Ok(Self {
            name: name.to_string(),
            x: known(coerce_coordinate("x", x)?),
            y: known(coerce_coordinate("y", y)?),
            floor: coerce_floor(floor).ok(),
        })
    }

    pub fn local_position(&self) -> Option<(f64, f64)> {
        Some((self.x?, self.y?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub id: String,
    pub floor: i32,
    pub position: Option<GeoPoint>,
}

impl AccessPoint {
    pub fn new(id: impl Into<String>, floor: i32, position: Option<GeoPoint>) -> Self {
        Self {
            id: id.into(),
            floor,
            position,
        }
    }
}

/// Read-only AP table keyed by identifier. Iterates in identifier order.
#[derive(Debug, Clone, Default)]
pub struct AccessPointLookup {
    points: BTreeMap<String, AccessPoint>,
}

impl AccessPointLookup {
    pub fn from_points<I: IntoIterator<Item = AccessPoint>>(points: I) -> Self {
        Self {
            points: points
                .into_iter()
                .map(|point| (point.id.clone(), point))
                .collect(),
        }
    }

    /// Places every survey row with a usable floor through the synthetic
    /// generator, keyed by AP name and floor. Returns the lookup and the
    /// number of rows skipped for lacking a floor.
    pub fn synthesize(records: &[ApRecord], placer: &SyntheticPlacer) -> (Self, usize) {
        let mut skipped = 0;
        let points: Vec<AccessPoint> = records
            .iter()
            .filter_map(|record| match record.floor {
                Some(floor) => Some(AccessPoint::new(
                    record.name.clone(),
                    floor,
                    Some(placer.place(&record.name, Some(floor))),
                )),
                None => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        (Self::from_points(points), skipped)
    }

    pub fn get(&self, id: &str) -> Option<&AccessPoint> {
        self.points.get(id)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessPoint> {
        self.points.values()
    }
}

/// Mean AP position per floor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FloorCentroids {
    centroids: BTreeMap<i32, GeoPoint>,
}

impl FloorCentroids {
    pub fn from_access_points(lookup: &AccessPointLookup) -> Self {
        let mut by_floor: BTreeMap<i32, Vec<GeoPoint>> = BTreeMap::new();
        for point in lookup.iter() {
            if let Some(position) = point.position {
                by_floor.entry(point.floor).or_default().push(position);
            }
        }
        let centroids = by_floor
            .into_iter()
            .filter_map(|(floor, points)| {
                StatsHelper::centroid(&points).map(|centroid| (floor, centroid))
            })
            .collect();
        Self { centroids }
    }

    pub fn from_map(centroids: BTreeMap<i32, GeoPoint>) -> Self {
        Self { centroids }
    }

    pub fn get(&self, floor: i32) -> Option<GeoPoint> {
        self.centroids.get(&floor).copied()
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, GeoPoint)> + '_ {
        self.centroids.iter().map(|(floor, point)| (*floor, *point))
    }
}

/// Shared, read-only inputs to placement. Built once per run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub access_points: Option<AccessPointLookup>,
    pub floor_centroids: Option<FloorCentroids>,
}

impl ReferenceTables {
    /// AP lookup plus the centroids derived from it.
    pub fn from_lookup(lookup: AccessPointLookup) -> Self {
        let floor_centroids = FloorCentroids::from_access_points(&lookup);
        Self {
            access_points: Some(lookup),
            floor_centroids: Some(floor_centroids),
        }
    }

    /// Centroids only, for a campus without its own AP data.
    pub fn centroids_only(floor_centroids: FloorCentroids) -> Self {
        Self {
            access_points: None,
            floor_centroids: Some(floor_centroids),
        }
    }
}
