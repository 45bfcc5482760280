use crate::ingest::access_points::load_ap_records;
use crate::ingest::signal_log::load_signal_log;
use crate::ingest::usage_log::load_usage_log;
use crate::workflow::config::{CampusConfig, ReferenceSource, WorkflowConfig};
use anyhow::Context;
use log::info;
use serde::Serialize;
use wifimapcore::prelude::{PipelineError, ProcessingStage, StageConfig, StageInput, StageOutput};
use wifimapcore::processing::{campus_totals, CampusTotals, PlacementStage, RemapStage, WindowStage};
use wifimapcore::reference::building::{aggregate_buildings, apply_names, calibrate_buildings};
use wifimapcore::reference::{AccessPointLookup, Building, PlacedObservation, ReferenceTables};
use wifimapcore::telemetry::{MetricsRecorder, PipelineCounts};

/// Placed tables and counts for one campus.
pub struct CampusRun {
    pub slug: String,
    pub label: String,
    pub placed: Vec<PlacedObservation>,
    pub deduplicated: Vec<PlacedObservation>,
    pub counts: PipelineCounts,
}

/// Access-point survey summary for the run report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SurveySummary {
    pub counts: PipelineCounts,
    pub access_points: usize,
    pub skipped_without_floor: usize,
    pub floor_centroids: usize,
}

pub struct WorkflowResult {
    pub tag: String,
    pub survey: SurveySummary,
    pub campuses: Vec<CampusRun>,
    pub totals: Vec<CampusTotals>,
    pub buildings: Option<Vec<Building>>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

fn run_stage<S: ProcessingStage>(
    stage: &mut S,
    config: &StageConfig,
    input: StageInput<S::Input>,
    name: &str,
) -> anyhow::Result<StageOutput<S::Output>> {
    stage
        .initialize(config)
        .with_context(|| format!("initializing {name} stage"))?;
    let output = stage
        .execute(input)
        .with_context(|| format!("executing {name} stage"));
    stage.cleanup();
    output
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        self.config.validate()?;
        self.config.validate_inputs()?;
        let stage_config = self.config.to_stage_config();
        let tag = self.config.target.tag()?;

        let survey_metrics = MetricsRecorder::new();
        let records = load_ap_records(&self.config.resolve(&self.config.ap_locations), &survey_metrics)?;
        let (lookup, skipped) = AccessPointLookup::synthesize(&records, &self.config.placer());
        if lookup.is_empty() {
            return Err(PipelineError::Configuration(
                "AP survey has no access points with a numeric floor".into(),
            )
            .into());
        }
        let surveyed = ReferenceTables::from_lookup(lookup);
        let centroids = surveyed.floor_centroids.clone().unwrap_or_default();
        let borrowed = ReferenceTables::centroids_only(centroids.clone());
        let survey = SurveySummary {
            counts: survey_metrics.snapshot(),
            access_points: surveyed.access_points.as_ref().map_or(0, AccessPointLookup::len),
            skipped_without_floor: skipped,
            floor_centroids: centroids.len(),
        };
        info!(
            "survey: {} access points on {} floors, {} without a floor",
            survey.access_points, survey.floor_centroids, skipped
        );

        let buildings = match &self.config.buildings {
            Some(settings) => {
                let mut buildings = aggregate_buildings(&records);
                calibrate_buildings(&mut buildings, &settings.anchors, settings.tolerance)
                    .context("calibrating building map positions")?;
                let named = apply_names(&mut buildings, &settings.names);
                info!("buildings: {} located, {} named", buildings.len(), named);
                Some(buildings)
            }
            None => None,
        };

        let mut campuses = Vec::with_capacity(self.config.campuses.len());
        for campus in &self.config.campuses {
            let tables = match campus.references {
                ReferenceSource::AccessPoints => &surveyed,
                ReferenceSource::CentroidsOnly => &borrowed,
            };
            let run = self
                .run_campus(campus, tables, &stage_config)
                .with_context(|| format!("processing campus {}", campus.slug))?;
            campuses.push(run);
        }

        let totals = campus_totals(
            campuses
                .iter()
                .map(|run| (run.label.as_str(), run.deduplicated.as_slice())),
        );

        Ok(WorkflowResult {
            tag,
            survey,
            campuses,
            totals,
            buildings,
        })
    }

    fn run_campus(
        &self,
        campus: &CampusConfig,
        tables: &ReferenceTables,
        stage_config: &StageConfig,
    ) -> anyhow::Result<CampusRun> {
        let metrics = MetricsRecorder::new();
        let mut observations = load_usage_log(
            &self.config.resolve(&campus.usage_log),
            campus,
            self.config.target,
            &metrics,
        )?;
        if let Some(signal_log) = &campus.signal_log {
            observations.extend(load_signal_log(&self.config.resolve(signal_log), &metrics)?);
        }

        let mut placement = PlacementStage::new(tables);
        let placed = run_stage(
            &mut placement,
            stage_config,
            StageInput::labelled(observations, campus.slug.as_str()),
            "placement",
        )?;
        if let Some(counts) = &placed.metadata.source_counts {
            metrics.record_placements(counts);
        }
        metrics.record_missing_reference(placed.metadata.missing_reference.unwrap_or(0));

        // Window after remapping: days clamped together share one window.
        let raw = run_stage(
            &mut RemapStage::new(),
            stage_config,
            StageInput::labelled(placed.records, campus.slug.as_str()),
            "remap",
        )?;
        let deduplicated = run_stage(
            &mut WindowStage::new(),
            stage_config,
            StageInput::labelled(raw.records.clone(), campus.slug.as_str()),
            "window",
        )?;
        metrics.record_deduplicated(deduplicated.metadata.removed.unwrap_or(0));

        Ok(CampusRun {
            slug: campus.slug.clone(),
            label: campus.label.clone(),
            placed: raw.records,
            deduplicated: deduplicated.records,
            counts: metrics.snapshot(),
        })
    }
}
