use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use wifimapcore::geo::calibration::DEFAULT_TOLERANCE_UNITS;
use wifimapcore::geo::point::BoundingBox;
use wifimapcore::geo::synthetic::{SyntheticPlacer, DEFAULT_FLOOR_JITTER_DEG};
use wifimapcore::prelude::{PipelineError, PipelineResult, StageConfig};
use wifimapcore::processing::{SignalModel, TargetMonth, WindowSpec};
use wifimapcore::reference::building::{default_anchors, default_building_names, BuildingAnchor};

/// Where a campus takes its placement references from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    /// The surveyed AP lookup and its floor centroids.
    #[default]
    AccessPoints,
    /// Floor centroids only, borrowed from the surveyed campus.
    CentroidsOnly,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampusConfig {
    pub slug: String,
    pub label: String,
    pub id_prefix: String,
    pub usage_log: PathBuf,
    /// Sum rows sharing (Date, Floor) before placement.
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default)]
    pub references: ReferenceSource,
    #[serde(default)]
    pub signal_log: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildingConfig {
    pub anchors: [BuildingAnchor; 2],
    pub names: BTreeMap<String, String>,
    pub tolerance: f64,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            anchors: default_anchors(),
            names: default_building_names(),
            tolerance: DEFAULT_TOLERANCE_UNITS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub root: PathBuf,
    pub out_dir: PathBuf,
    pub ap_locations: PathBuf,
    pub bbox: BoundingBox,
    pub floor_jitter_deg: f64,
    pub window: WindowSpec,
    pub target: TargetMonth,
    pub signal: SignalModel,
    pub campuses: Vec<CampusConfig>,
    pub buildings: Option<BuildingConfig>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            out_dir: PathBuf::from("outputs"),
            ap_locations: PathBuf::from("APlocations.csv"),
            bbox: BoundingBox::default(),
            floor_jitter_deg: DEFAULT_FLOOR_JITTER_DEG,
            window: WindowSpec::default(),
            target: TargetMonth::default(),
            signal: SignalModel::default(),
            campuses: vec![
                CampusConfig {
                    slug: "dartmouth".into(),
                    label: "Main (Dartmouth 2015-01)".into(),
                    id_prefix: "dart".into(),
                    usage_log: PathBuf::from("dartmouth_movement_agg_demo.csv"),
                    aggregate: false,
                    references: ReferenceSource::AccessPoints,
                    signal_log: None,
                },
                CampusConfig {
                    slug: "hk".into(),
                    label: "Sub (HongKong 2015-01)".into(),
                    id_prefix: "hk".into(),
                    usage_log: PathBuf::from("202101-wifi-raw.csv"),
                    aggregate: true,
                    references: ReferenceSource::CentroidsOnly,
                    signal_log: None,
                },
            ],
            buildings: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    /// Paths in the config are relative to `root` unless absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.out_dir)
    }

    pub fn required_inputs(&self) -> Vec<PathBuf> {
        let mut inputs = vec![self.resolve(&self.ap_locations)];
        for campus in &self.campuses {
            inputs.push(self.resolve(&campus.usage_log));
            if let Some(signal_log) = &campus.signal_log {
                inputs.push(self.resolve(signal_log));
            }
        }
        inputs
    }

    /// Checks every input up front and reports all missing files at once.
    pub fn validate_inputs(&self) -> PipelineResult<()> {
        let missing: Vec<PathBuf> = self
            .required_inputs()
            .into_iter()
            .filter(|path| !path.is_file())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::MissingInputs(missing))
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        self.bbox.validate()?;
        TargetMonth::new(self.target.year, self.target.month)?;
        if self.campuses.is_empty() {
            return Err(PipelineError::Configuration("no campuses configured".into()));
        }
        let mut slugs: Vec<&str> = self.campuses.iter().map(|c| c.slug.as_str()).collect();
        slugs.sort_unstable();
        if slugs.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(PipelineError::Configuration(
                "campus slugs must be unique".into(),
            ));
        }
        Ok(())
    }

    pub fn placer(&self) -> SyntheticPlacer {
        SyntheticPlacer::new(self.bbox, self.floor_jitter_deg)
    }

    pub fn to_stage_config(&self) -> StageConfig {
        StageConfig {
            window: self.window,
            target: self.target,
            signal: self.signal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn default_config_mirrors_the_two_campus_run() {
        let cfg = WorkflowConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.campuses.len(), 2);
        assert_eq!(cfg.campuses[1].references, ReferenceSource::CentroidsOnly);
        assert_eq!(cfg.to_stage_config().window.seconds(), 86_400);
        assert_eq!(cfg.target.tag().unwrap(), "jan2015");
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"root: /data/wifi\nwindow: 5T\ntarget:\n  year: 2016\n  month: 2\ncampuses:\n  - slug: dart\n    label: Main\n    id_prefix: dart\n    usage_log: agg.csv\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.window.seconds(), 300);
        assert_eq!(cfg.target, TargetMonth { year: 2016, month: 2 });
        assert_eq!(cfg.campuses[0].references, ReferenceSource::AccessPoints);
        assert!(!cfg.campuses[0].aggregate);
        assert_eq!(cfg.signal, SignalModel::default());
        assert_eq!(
            cfg.required_inputs(),
            vec![
                PathBuf::from("/data/wifi/APlocations.csv"),
                PathBuf::from("/data/wifi/agg.csv")
            ]
        );
    }

    #[test]
    fn bundled_workflow_enables_buildings() {
        let cfg = WorkflowConfig::load(concat!(env!("CARGO_MANIFEST_DIR"), "/workflows/campus.yaml"))
            .unwrap();
        cfg.validate().unwrap();
        let buildings = cfg.buildings.unwrap();
        assert_eq!(buildings.anchors[1].code, "AthlBldg3");
        assert_eq!(buildings.names["AcadBldg25"], "Reed Hall");
        assert!(cfg.campuses[1].aggregate);
    }

    #[test]
    fn invalid_window_fails_to_parse() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"window: 0D\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }

    #[test]
    fn validate_inputs_lists_every_missing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("APlocations.csv"), "#AP,x,y,z\n").unwrap();
        let cfg = WorkflowConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        match cfg.validate_inputs() {
            Err(PipelineError::MissingInputs(missing)) => {
                assert_eq!(missing.len(), 2);
                assert!(missing[0].ends_with("dartmouth_movement_agg_demo.csv"));
                assert!(missing[1].ends_with("202101-wifi-raw.csv"));
            }
            other => panic!("expected missing inputs, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_slugs_are_rejected() {
        let mut cfg = WorkflowConfig::default();
        cfg.campuses[1].slug = cfg.campuses[0].slug.clone();
        assert!(matches!(
            cfg.validate(),
            Err(PipelineError::Configuration(_))
        ));
    }
}
