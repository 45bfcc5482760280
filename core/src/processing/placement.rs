use crate::geo::point::GeoPoint;
use crate::geo::synthetic::hash_unit;
use crate::prelude::{
    PipelineError, ProcessingStage, StageConfig, StageInput, StageMetadata, StageOutput,
    StageResult,
};
use crate::processing::signal::SignalModel;
use crate::reference::access_point::ReferenceTables;
use crate::reference::observation::Observation;
use crate::reference::placed::{PlacedObservation, Placement, SourceCounts};
use crate::telemetry::log::LogManager;
use std::collections::BTreeSet;

/// Upper bound of the floor-only de-overlap offset, in degrees.
pub const FLOOR_OFFSET_SPAN_DEG: f64 = 1e-5;

/// Deterministic per-(device, floor) offset in `[0, FLOOR_OFFSET_SPAN_DEG)`.
pub fn floor_offset(device_id: &str, floor: i32) -> f64 {
    hash_unit(&format!("{device_id}::floor::{floor}")) * FLOOR_OFFSET_SPAN_DEG
}

/// Resolves one observation: GPS, then RSSI against the AP lookup, then the
/// floor centroid, else unplaced. Pure in its arguments.
pub fn place_observation(
    observation: &Observation,
    tables: &ReferenceTables,
    model: &SignalModel,
) -> Placement {
    if let Some(gps) = observation.gps.filter(|p| p.lat.is_finite() && p.lon.is_finite()) {
        return Placement::Gps(gps);
    }

    if let Some(lookup) = tables.access_points.as_ref() {
        if !observation.signals.is_empty() && !lookup.is_empty() {
            if let Some(estimate) = model.estimate(&observation.signals, lookup, observation.floor) {
                return Placement::Rssi(estimate);
            }
        }
    }

    if let (Some(floor), Some(centroids)) = (observation.floor, tables.floor_centroids.as_ref()) {
        if let Some(centroid) = centroids.get(floor) {
            let offset = floor_offset(&observation.device_id, floor);
            return Placement::FloorOnly(GeoPoint::new(
                centroid.lat + offset,
                centroid.lon - offset,
            ));
        }
    }

    Placement::Unplaced
}

/// Placement stage over a borrowed, immutable set of reference tables.
pub struct PlacementStage<'a> {
    tables: &'a ReferenceTables,
    config: Option<StageConfig>,
    logger: LogManager,
}

impl<'a> PlacementStage<'a> {
    pub fn new(tables: &'a ReferenceTables) -> Self {
        Self {
            tables,
            config: None,
            logger: LogManager::new("placement"),
        }
    }
}

impl ProcessingStage for PlacementStage<'_> {
    type Input = Observation;
    type Output = PlacedObservation;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(
        &mut self,
        input: StageInput<Observation>,
    ) -> StageResult<StageOutput<PlacedObservation>> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PipelineError::Internal("stage not initialized".into()))?;

        let mut counts = SourceCounts::default();
        let mut missing_reference = 0usize;
        let mut missing_floors = BTreeSet::new();
        let records: Vec<PlacedObservation> = input
            .records
            .into_iter()
            .map(|observation| {
                let placement = place_observation(&observation, self.tables, &config.signal);
                counts.record(placement.source());
                if let (Placement::Unplaced, Some(floor)) = (placement, observation.floor) {
                    missing_reference += 1;
                    missing_floors.insert(floor);
                }
                PlacedObservation::new(observation, placement)
            })
            .collect();

        if !missing_floors.is_empty() {
            self.logger.warn(&format!(
                "{} records on floors without a centroid: {:?}",
                missing_reference, missing_floors
            ));
        }

        let label = input.label.as_deref().unwrap_or("batch");
        self.logger.record(&format!(
            "{}: placed {} records (gps {}, rssi {}, floor_only {}, unplaced {})",
            label,
            counts.total(),
            counts.gps,
            counts.rssi,
            counts.floor_only,
            counts.unplaced
        ));

        let metadata = StageMetadata {
            source_counts: Some(counts),
            missing_reference: Some(missing_reference),
            notes: vec![format!("placed {}", counts.total())],
            ..Default::default()
        };

        Ok(StageOutput { records, metadata })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::remap::TargetMonth;
    use crate::processing::window::WindowSpec;
    use crate::reference::access_point::{AccessPoint, AccessPointLookup, FloorCentroids};
    use crate::reference::observation::Signal;
    use crate::reference::placed::PlacementSource;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn observation(device: &str) -> Observation {
        let timestamp = NaiveDate::from_ymd_opt(2015, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Observation::new(device, timestamp)
    }

    fn tables() -> ReferenceTables {
        ReferenceTables::from_lookup(AccessPointLookup::from_points(vec![
            AccessPoint::new("AcadBldg10AP1", 3, Some(GeoPoint::new(43.7031, -72.2912))),
            AccessPoint::new("AcadBldg10AP2", 3, Some(GeoPoint::new(43.7011, -72.2890))),
            AccessPoint::new("ResBldg4AP1", 1, Some(GeoPoint::new(43.7040, -72.2870))),
        ]))
    }

    fn stage_config() -> StageConfig {
        StageConfig {
            window: WindowSpec::default(),
            target: TargetMonth::new(2015, 1).unwrap(),
            signal: SignalModel::default(),
        }
    }

    #[test]
    fn gps_wins_over_everything_else() {
        let obs = observation("dev1")
            .with_gps(43.0, -72.0)
            .with_floor(3)
            .with_signals(vec![Signal::new("AcadBldg10AP1", -40.0)]);
        let placement = place_observation(&obs, &tables(), &SignalModel::default());
        assert_eq!(placement, Placement::Gps(GeoPoint::new(43.0, -72.0)));
        assert_eq!(placement.confidence(), 1.0);
    }

    #[test]
    fn single_signal_on_same_floor_resolves_to_that_access_point() {
        let obs = observation("dev2")
            .with_floor(3)
            .with_signals(vec![Signal::new("AcadBldg10AP1", -50.0)]);
        let placement = place_observation(&obs, &tables(), &SignalModel::default());
        assert_eq!(placement.source(), PlacementSource::Rssi);
        assert_eq!(placement.confidence(), 0.7);
        let position = placement.position().unwrap();
        assert!((position.lat - 43.7031).abs() < 1e-12);
        assert!((position.lon + 72.2912).abs() < 1e-12);
    }

    #[test]
    fn unknown_signals_fall_through_to_floor_centroid() {
        let obs = observation("dev3")
            .with_floor(3)
            .with_signals(vec![Signal::new("SomewhereElse", -45.0)]);
        let placement = place_observation(&obs, &tables(), &SignalModel::default());
        assert_eq!(placement.source(), PlacementSource::FloorOnly);
        assert_eq!(placement.confidence(), 0.3);

        let centroid = tables().floor_centroids.unwrap().get(3).unwrap();
        let position = placement.position().unwrap();
        let offset = floor_offset("dev3", 3);
        assert!(offset >= 0.0 && offset < FLOOR_OFFSET_SPAN_DEG);
        assert_eq!(position, GeoPoint::new(centroid.lat + offset, centroid.lon - offset));
    }

    #[test]
    fn floor_offset_is_stable_and_device_specific() {
        assert_eq!(floor_offset("dart_f3_2015-01-05", 3), floor_offset("dart_f3_2015-01-05", 3));
        assert_ne!(floor_offset("dart_f3_2015-01-05", 3), floor_offset("dart_f3_2015-01-06", 3));
    }

    #[test]
    fn floor_without_centroid_is_unplaced() {
        let obs = observation("dev4").with_floor(7);
        let placement = place_observation(&obs, &tables(), &SignalModel::default());
        assert_eq!(placement, Placement::Unplaced);
        assert_eq!(placement.confidence(), 0.0);
        assert!(placement.position().is_none());
    }

    #[test]
    fn centroid_only_tables_skip_the_signal_step() {
        let centroids = FloorCentroids::from_map(BTreeMap::from([(2, GeoPoint::new(43.7, -72.29))]));
        let tables = ReferenceTables::centroids_only(centroids);
        let obs = observation("hk_f2_2015-01-03")
            .with_floor(2)
            .with_signals(vec![Signal::new("AcadBldg10AP1", -40.0)]);
        let placement = place_observation(&obs, &tables, &SignalModel::default());
        assert_eq!(placement.source(), PlacementSource::FloorOnly);
    }

    #[test]
    fn stage_counts_sources_and_preserves_floor() {
        let reference = tables();
        let mut stage = PlacementStage::new(&reference);
        stage.initialize(&stage_config()).unwrap();

        let output = stage
            .execute(StageInput::labelled(
                vec![
                    observation("a").with_gps(43.7, -72.29),
                    observation("b").with_floor(3),
                    observation("c").with_floor(7),
                    observation("d"),
                ],
                "test",
            ))
            .unwrap();

        let counts = output.metadata.source_counts.unwrap();
        assert_eq!((counts.gps, counts.rssi, counts.floor_only, counts.unplaced), (1, 0, 1, 2));
        assert_eq!(output.metadata.missing_reference, Some(1));
        assert_eq!(output.records[2].floor, Some(7));
        assert_eq!(output.records[3].floor, None);
        stage.cleanup();
    }

    #[test]
    fn stage_requires_initialization() {
        let reference = tables();
        let mut stage = PlacementStage::new(&reference);
        let err = stage.execute(StageInput::new(vec![observation("a")])).unwrap_err();
        assert!(matches!(err, PipelineError::Internal(_)));
    }
}
