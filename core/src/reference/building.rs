//! Building-level aggregation of the AP survey and its calibration onto the
//! campus map.

use crate::geo::calibration::{CalibrationTransform, ReferencePair};
use crate::prelude::{PipelineError, PipelineResult};
use crate::reference::access_point::ApRecord;
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Building code and type parsed from an AP name such as `AcadBldg10AP13`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingCode {
    pub code: String,
    pub kind: String,
}

impl BuildingCode {
    pub fn parse(ap_name: &str) -> Option<Self> {
        let letters_end = ap_name
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(ap_name.len());
        let kind = ap_name[..letters_end].strip_suffix("Bldg")?;
        if kind.is_empty() {
            return None;
        }
        let digits: String = ap_name[letters_end..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            return None;
        }
        Some(Self {
            code: format!("{kind}Bldg{digits}"),
            kind: kind.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub code: String,
    pub name: String,
    pub kind: String,
    pub access_points: usize,
    pub local_x: f64,
    pub local_y: f64,
    pub pixel: Option<(i64, i64)>,
}

/// A building whose map pixel position is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingAnchor {
    pub code: String,
    pub pixel_x: f64,
    pub pixel_y: f64,
}

impl BuildingAnchor {
    pub fn new(code: impl Into<String>, pixel_x: f64, pixel_y: f64) -> Self {
        Self {
            code: code.into(),
            pixel_x,
            pixel_y,
        }
    }

    fn reference(&self, buildings: &[Building]) -> PipelineResult<ReferencePair> {
        let building = buildings
            .iter()
            .find(|building| building.code == self.code)
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "calibration anchor {} has no located access points",
                    self.code
                ))
            })?;
        Ok(ReferencePair::new(
            (building.local_x, building.local_y),
            (self.pixel_x, self.pixel_y),
        ))
    }
}

/// Reed Hall and Thompson Arena on the 5100x3300 Dartmouth campus map.
pub fn default_anchors() -> [BuildingAnchor; 2] {
    [
        BuildingAnchor::new("AcadBldg25", 689.0, 494.0),
        BuildingAnchor::new("AthlBldg3", 981.0, 627.0),
    ]
}

pub fn default_building_names() -> BTreeMap<String, String> {
    [
        ("AcadBldg25", "Reed Hall"),
        ("AthlBldg3", "Thompson Arena"),
        ("SocBldg11", "Collis Center"),
        ("LibBldg1", "Baker-Berry Library (Main)"),
        ("LibBldg2", "Baker-Berry Library (Tower)"),
        ("AcadBldg10", "Dartmouth Hall"),
        ("SocBldg4", "Hopkins Center for the Arts"),
    ]
    .into_iter()
    .map(|(code, name)| (code.to_string(), name.to_string()))
    .collect()
}

/// Groups located APs by building code, averaging their local coordinates.
/// Output is ordered by code.
pub fn aggregate_buildings(records: &[ApRecord]) -> Vec<Building> {
    let mut groups: BTreeMap<String, (String, Vec<(f64, f64)>)> = BTreeMap::new();
    for record in records {
        let (Some(position), Some(code)) = (record.local_position(), BuildingCode::parse(&record.name))
        else {
            continue;
        };
        groups
            .entry(code.code)
            .or_insert_with(|| (code.kind, Vec::new()))
            .1
            .push(position);
    }

    groups
        .into_iter()
        .map(|(code, (kind, positions))| {
            let count = positions.len() as f64;
            let local_x = positions.iter().map(|p| p.0).sum::<f64>() / count;
            let local_y = positions.iter().map(|p| p.1).sum::<f64>() / count;
            Building {
                name: code.clone(),
                code,
                kind,
                access_points: positions.len(),
                local_x,
                local_y,
                pixel: None,
            }
        })
        .collect()
}

/// Solves the transform from the two anchors, verifies it against them and
/// writes pixel coordinates onto every building.
pub fn calibrate_buildings(
    buildings: &mut [Building],
    anchors: &[BuildingAnchor; 2],
    tolerance: f64,
) -> PipelineResult<CalibrationTransform> {
    let first = anchors[0].reference(buildings)?;
    let second = anchors[1].reference(buildings)?;
    let transform = CalibrationTransform::from_references(&first, &second)?;

    for building in buildings.iter_mut() {
        building.pixel = Some(transform.apply(building.local_x, building.local_y));
    }

    let errors = transform.verify(&[first, second], tolerance)?;
    LogManager::new("calibration").record(&format!(
        "scale x={:.6} y={:.6}, anchor errors {:?}",
        transform.x.scale, transform.y.scale, errors
    ));
    Ok(transform)
}

/// Applies display names, falling back to the building code.
pub fn apply_names(buildings: &mut [Building], names: &BTreeMap<String, String>) -> usize {
    let mut named = 0;
    for building in buildings.iter_mut() {
        match names.get(&building.code) {
            Some(name) => {
                building.name = name.clone();
                named += 1;
            }
            None => building.name = building.code.clone(),
        }
    }
    named
}
