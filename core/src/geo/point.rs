use crate::prelude::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// WGS84-style position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Builds a point only when both components are present and finite.
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        match (lat, lon) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => {
                Some(Self::new(lat, lon))
            }
            _ => None,
        }
    }
}

/// Latitude/longitude rectangle used for synthetic placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> PipelineResult<Self> {
        let bbox = Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let finite = [self.lat_min, self.lat_max, self.lon_min, self.lon_max]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.lat_min >= self.lat_max || self.lon_min >= self.lon_max {
            return Err(PipelineError::Configuration(format!(
                "bounding box must satisfy min < max on both axes, got lat {}..{} lon {}..{}",
                self.lat_min, self.lat_max, self.lon_min, self.lon_max
            )));
        }
        Ok(())
    }

    /// Linear interpolation by unit fractions along each axis.
    pub fn interpolate(&self, u: f64, v: f64) -> GeoPoint {
        GeoPoint::new(
            self.lat_min + u * (self.lat_max - self.lat_min),
            self.lon_min + v * (self.lon_max - self.lon_min),
        )
    }

    /// Pulls a point strictly inside the box, at least `EDGE_MARGIN` of the
    /// span away from every edge.
    pub fn clamp_inside(&self, point: GeoPoint) -> GeoPoint {
        let (lat_lo, lat_hi) = inset(self.lat_min, self.lat_max);
        let (lon_lo, lon_hi) = inset(self.lon_min, self.lon_max);
        GeoPoint::new(
            point.lat.clamp(lat_lo, lat_hi),
            point.lon.clamp(lon_lo, lon_hi),
        )
    }

    /// Open-interval test on both axes; points on an edge are outside.
    pub fn contains_strictly(&self, point: &GeoPoint) -> bool {
        self.lat_min < point.lat
            && point.lat < self.lat_max
            && self.lon_min < point.lon
            && point.lon < self.lon_max
    }
}

/// Fraction of the span kept clear of each edge by `clamp_inside`.
pub const EDGE_MARGIN: f64 = 1e-9;

fn inset(min: f64, max: f64) -> (f64, f64) {
    let margin = (max - min) * EDGE_MARGIN;
    let (lo, hi) = (min + margin, max - margin);
    if min < lo && lo <= hi && hi < max {
        (lo, hi)
    } else {
        // Margin lost to rounding; the midpoint is still interior.
        let mid = min + (max - min) / 2.0;
        (mid, mid)
    }
}

impl Default for BoundingBox {
    /// Dartmouth main campus.
    fn default() -> Self {
        Self {
            lat_min: 43.7000,
            lat_max: 43.7050,
            lon_min: -72.2950,
            lon_max: -72.2850,
        }
    }
}
