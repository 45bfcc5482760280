//! Two-point affine calibration from a local coordinate frame onto map pixels
//! (or any other target frame). Each axis is solved independently.

use crate::prelude::{PipelineError, PipelineResult};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};

/// Reference error above which the self-check logs a warning.
pub const SELF_CHECK_WARN_UNITS: f64 = 1.0;
/// Default reference error above which calibration is rejected.
pub const DEFAULT_TOLERANCE_UNITS: f64 = 5.0;

/// A point known in both the source and the target frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePair {
    pub source_x: f64,
    pub source_y: f64,
    pub target_x: f64,
    pub target_y: f64,
}

impl ReferencePair {
    pub fn new(source: (f64, f64), target: (f64, f64)) -> Self {
        Self {
            source_x: source.0,
            source_y: source.1,
            target_x: target.0,
            target_y: target.1,
        }
    }
}

/// `target = scale * source + offset` along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisMap {
    pub scale: f64,
    pub offset: f64,
}

impl AxisMap {
    fn solve(
        axis: &'static str,
        source: (f64, f64),
        target: (f64, f64),
    ) -> PipelineResult<Self> {
        let delta = source.1 - source.0;
        let scale = (target.1 - target.0) / delta;
        if delta == 0.0 || !scale.is_finite() {
            return Err(PipelineError::DegenerateCalibration { axis });
        }
        Ok(Self {
            scale,
            offset: target.0 - scale * source.0,
        })
    }

    pub fn apply(&self, value: f64) -> f64 {
        self.scale * value + self.offset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTransform {
    pub x: AxisMap,
    pub y: AxisMap,
}

impl CalibrationTransform {
    /// Solves the per-axis maps. Fails when the references share a source
    /// coordinate on either axis.
    pub fn from_references(first: &ReferencePair, second: &ReferencePair) -> PipelineResult<Self> {
        let x = AxisMap::solve(
            "x",
            (first.source_x, second.source_x),
            (first.target_x, second.target_x),
        )?;
        let y = AxisMap::solve(
            "y",
            (first.source_y, second.source_y),
            (first.target_y, second.target_y),
        )?;
        Ok(Self { x, y })
    }

    pub fn apply_exact(&self, source_x: f64, source_y: f64) -> (f64, f64) {
        (self.x.apply(source_x), self.y.apply(source_y))
    }

    /// Rounded target coordinates, as written to the pixel tables.
    pub fn apply(&self, source_x: f64, source_y: f64) -> (i64, i64) {
        let (x, y) = self.apply_exact(source_x, source_y);
        (x.round() as i64, y.round() as i64)
    }

    /// Euclidean distance between the rounded output at a reference's source
    /// point and its declared target.
    pub fn reference_error(&self, reference: &ReferencePair) -> f64 {
        let (x, y) = self.apply(reference.source_x, reference.source_y);
        (x as f64 - reference.target_x).hypot(y as f64 - reference.target_y)
    }

    /// Recomputes every reference and fails past `tolerance`. Errors above one
    /// unit but within tolerance are logged.
    pub fn verify(&self, references: &[ReferencePair], tolerance: f64) -> PipelineResult<Vec<f64>> {
        let logger = LogManager::new("calibration");
        let mut errors = Vec::with_capacity(references.len());
        for (index, reference) in references.iter().enumerate() {
            let error = self.reference_error(reference);
            if error > tolerance {
                return Err(PipelineError::CalibrationDrift {
                    reference: index,
                    error,
                    tolerance,
                });
            }
            if error > SELF_CHECK_WARN_UNITS {
                logger.warn(&format!(
                    "reference {} reproduces with error {:.2} units",
                    index, error
                ));
            }
            errors.push(error);
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagonal() -> (ReferencePair, ReferencePair) {
        (
            ReferencePair::new((0.0, 0.0), (100.0, 100.0)),
            ReferencePair::new((10.0, 10.0), (200.0, 200.0)),
        )
    }

    #[test]
    fn midpoint_maps_to_midpoint() {
        let (a, b) = diagonal();
        let transform = CalibrationTransform::from_references(&a, &b).unwrap();
        assert_eq!(transform.apply(5.0, 5.0), (150, 150));
    }

    #[test]
    fn references_reproduce_their_targets() {
        let a = ReferencePair::new((1203.4, 877.1), (689.0, 494.0));
        let b = ReferencePair::new((1530.9, 1011.6), (981.0, 627.0));
        let transform = CalibrationTransform::from_references(&a, &b).unwrap();
        let errors = transform.verify(&[a, b], DEFAULT_TOLERANCE_UNITS).unwrap();
        assert!(errors.iter().all(|&e| e <= SELF_CHECK_WARN_UNITS));
    }

    #[test]
    fn axes_are_independent() {
        let a = ReferencePair::new((0.0, 0.0), (0.0, 50.0));
        let b = ReferencePair::new((2.0, 4.0), (10.0, 30.0));
        let transform = CalibrationTransform::from_references(&a, &b).unwrap();
        assert_eq!(transform.x.scale, 5.0);
        assert_eq!(transform.y.scale, -5.0);
        assert_eq!(transform.y.offset, 50.0);
    }

    #[test]
    fn coincident_sources_are_rejected() {
        let a = ReferencePair::new((3.0, 3.0), (10.0, 10.0));
        let b = ReferencePair::new((3.0, 3.0), (20.0, 20.0));
        let err = CalibrationTransform::from_references(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DegenerateCalibration { axis: "x" }
        ));
    }

    #[test]
    fn shared_y_is_rejected_even_when_x_differs() {
        let a = ReferencePair::new((0.0, 3.0), (10.0, 10.0));
        let b = ReferencePair::new((5.0, 3.0), (20.0, 20.0));
        let err = CalibrationTransform::from_references(&a, &b).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DegenerateCalibration { axis: "y" }
        ));
    }

    #[test]
    fn drift_past_tolerance_fails_verification() {
        let (a, b) = diagonal();
        let transform = CalibrationTransform::from_references(&a, &b).unwrap();
        let shifted = ReferencePair::new((0.0, 0.0), (110.0, 100.0));
        let err = transform
            .verify(&[shifted], DEFAULT_TOLERANCE_UNITS)
            .unwrap_err();
        assert!(matches!(err, PipelineError::CalibrationDrift { reference: 0, .. }));
    }
}
