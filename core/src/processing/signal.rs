use crate::geo::point::GeoPoint;
use crate::reference::access_point::AccessPointLookup;
use crate::reference::observation::Signal;
use serde::{Deserialize, Serialize};

/// Constants of the RSSI weighted-centroid estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalModel {
    pub min_dbm: f64,
    pub max_dbm: f64,
    pub floor_penalty_db: f64,
    pub decay_k: f64,
}

impl Default for SignalModel {
    fn default() -> Self {
        Self {
            min_dbm: -90.0,
            max_dbm: -30.0,
            floor_penalty_db: 8.0,
            decay_k: 12.0,
        }
    }
}

impl SignalModel {
    /// Positive weight, increasing with strength over the clamp range.
    /// The penalty applies after clamping. NaN strength weighs nothing.
    pub fn weight(&self, rssi_dbm: f64, penalty_db: f64) -> f64 {
        if rssi_dbm.is_nan() {
            return 0.0;
        }
        let adjusted = rssi_dbm.clamp(self.min_dbm, self.max_dbm) - penalty_db;
        ((adjusted - self.min_dbm) / self.decay_k).exp()
    }

    /// Weighted centroid of the APs heard. `None` when no signal hits a
    /// located AP or all weights vanish.
    pub fn estimate(
        &self,
        signals: &[Signal],
        lookup: &AccessPointLookup,
        target_floor: Option<i32>,
    ) -> Option<GeoPoint> {
        let mut weight_sum = 0.0;
        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        let mut used = 0usize;

        for signal in signals {
            let Some(ap) = lookup.get(&signal.ap_id) else {
                continue;
            };
            let Some(position) = ap.position else {
                continue;
            };
            let penalty = match target_floor {
                Some(floor) if floor != ap.floor => self.floor_penalty_db,
                _ => 0.0,
            };
            let weight = self.weight(signal.rssi_dbm, penalty);
            lat_sum += weight * position.lat;
            lon_sum += weight * position.lon;
            weight_sum += weight;
            used += 1;
        }

        if used == 0 || weight_sum == 0.0 {
            return None;
        }
        Some(GeoPoint::new(lat_sum / weight_sum, lon_sum / weight_sum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::access_point::AccessPoint;

    fn lookup() -> AccessPointLookup {
        AccessPointLookup::from_points(vec![
            AccessPoint::new("north", 3, Some(GeoPoint::new(43.704, -72.290))),
            AccessPoint::new("south", 3, Some(GeoPoint::new(43.700, -72.290))),
            AccessPoint::new("upstairs", 4, Some(GeoPoint::new(43.702, -72.286))),
            AccessPoint::new("ghost", 3, None),
        ])
    }

    #[test]
    fn weight_increases_strictly_across_clamp_range() {
        let model = SignalModel::default();
        let weights: Vec<f64> = (-90..=-30)
            .map(|dbm| model.weight(dbm as f64, 0.0))
            .collect();
        assert!(weights.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(model.weight(-20.0, 0.0), model.weight(-30.0, 0.0));
        assert_eq!(model.weight(-120.0, 0.0), 1.0);
        assert_eq!(model.weight(f64::NAN, 0.0), 0.0);
    }

    #[test]
    fn floor_penalty_lowers_weight() {
        let model = SignalModel::default();
        assert!(model.weight(-50.0, 8.0) < model.weight(-50.0, 0.0));
    }

    #[test]
    fn single_signal_returns_that_access_point() {
        let estimate = SignalModel::default()
            .estimate(&[Signal::new("north", -50.0)], &lookup(), Some(3))
            .unwrap();
        assert!((estimate.lat - 43.704).abs() < 1e-12);
        assert!((estimate.lon + 72.290).abs() < 1e-12);
    }

    #[test]
    fn stronger_signal_pulls_the_centroid() {
        let estimate = SignalModel::default()
            .estimate(
                &[Signal::new("north", -40.0), Signal::new("south", -80.0)],
                &lookup(),
                Some(3),
            )
            .unwrap();
        assert!(estimate.lat > 43.702);
        assert!(estimate.lat < 43.704);
    }

    #[test]
    fn other_floor_access_point_counts_less() {
        let model = SignalModel::default();
        let signals = [Signal::new("south", -60.0), Signal::new("upstairs", -60.0)];
        let same_floor = model.estimate(&signals, &lookup(), Some(3)).unwrap();
        let no_floor = model.estimate(&signals, &lookup(), None).unwrap();
        // Without a target floor both weigh the same and the centroid is the midpoint.
        assert!((no_floor.lon - (-72.288)).abs() < 1e-9);
        assert!(same_floor.lon < no_floor.lon);
    }

    #[test]
    fn no_estimate_without_known_located_access_points() {
        let model = SignalModel::default();
        assert!(model.estimate(&[], &lookup(), Some(3)).is_none());
        assert!(model
            .estimate(&[Signal::new("nowhere", -40.0)], &lookup(), Some(3))
            .is_none());
        assert!(model
            .estimate(&[Signal::new("ghost", -40.0)], &lookup(), Some(3))
            .is_none());
    }

    #[test]
    fn nan_only_signals_give_no_estimate() {
        let estimate = SignalModel::default().estimate(
            &[Signal::new("north", f64::NAN)],
            &lookup(),
            Some(3),
        );
        assert!(estimate.is_none());
    }
}
