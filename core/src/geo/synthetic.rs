//! Deterministic hash-based placement for entities without surveyed
//! coordinates.

use crate::geo::point::{BoundingBox, GeoPoint};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const UNIT_MODULUS: u32 = 10_000_000;

/// Default per-floor jitter span in degrees.
pub const DEFAULT_FLOOR_JITTER_DEG: f64 = 0.0003;

/// Maps a key onto `[0, 1)`: the first four SHA-256 digest bytes as a
/// big-endian integer, reduced modulo 10^7.
pub fn hash_unit(key: &str) -> f64 {
    let digest = Sha256::digest(key.as_bytes());
    let head = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    (head % UNIT_MODULUS) as f64 / UNIT_MODULUS as f64
}

/// Zero-mean variant of [`hash_unit`] on `[-0.5, 0.5)`.
pub fn hash_centered(key: &str) -> f64 {
    hash_unit(key) - 0.5
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SyntheticPlacer {
    pub bbox: BoundingBox,
    pub floor_jitter_deg: f64,
}

impl SyntheticPlacer {
    pub fn new(bbox: BoundingBox, floor_jitter_deg: f64) -> Self {
        Self {
            bbox,
            floor_jitter_deg,
        }
    }

    pub fn place(&self, label: &str, floor: Option<i32>) -> GeoPoint {
        let u = hash_unit(&format!("{label}::lat"));
        let v = hash_unit(&format!("{label}::lon"));
        let mut point = self.bbox.interpolate(u, v);
        if let Some(floor) = floor {
            let fu = hash_centered(&format!("{label}::floor::{floor}::u"));
            let fv = hash_centered(&format!("{label}::floor::{floor}::v"));
            point.lat += fu * self.floor_jitter_deg;
            point.lon += fv * self.floor_jitter_deg;
        }
        self.bbox.clamp_inside(point)
    }
}

impl Default for SyntheticPlacer {
    fn default() -> Self {
        Self::new(BoundingBox::default(), DEFAULT_FLOOR_JITTER_DEG)
    }
}
