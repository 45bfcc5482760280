use crate::geo::point::GeoPoint;

pub struct StatsHelper;

impl StatsHelper {
    /// Unweighted mean position; `None` for an empty set.
    pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
        if points.is_empty() {
            return None;
        }
        let count = points.len() as f64;
        let lat = points.iter().map(|p| p.lat).sum::<f64>() / count;
        let lon = points.iter().map(|p| p.lon).sum::<f64>() / count;
        Some(GeoPoint::new(lat, lon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_empty_set_is_none() {
        assert_eq!(StatsHelper::centroid(&[]), None);
    }

    #[test]
    fn centroid_averages_each_axis() {
        let centroid = StatsHelper::centroid(&[
            GeoPoint::new(43.70, -72.29),
            GeoPoint::new(43.71, -72.27),
        ])
        .unwrap();
        assert!((centroid.lat - 43.705).abs() < 1e-12);
        assert!((centroid.lon + 72.28).abs() < 1e-12);
    }
}
