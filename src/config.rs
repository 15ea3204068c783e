use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::BackendKind;
use crate::error::{PatrolError, Result};
use crate::fusion::{DangerZone, FusionSettings};
use crate::PERSON_CLASS;

const DEFAULT_SEQUENCE_ROOT: &str = "data/sequence";
const DEFAULT_RGB_DIR: &str = "rgb";
const DEFAULT_POINTCLOUD_DIR: &str = "pointcloud";
const DEFAULT_TIMESTAMPS_FILE: &str = "timestamps.txt";
const DEFAULT_PLAY_FPS: f64 = 10.0;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_INPUT_SIZE: [u32; 2] = [640, 640];
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_ZONE_NAME: &str = "danger_zone";
const DEFAULT_ZONE: [f64; 4] = [0.3, 0.7, 0.3, 0.9];
const DEFAULT_STAY_TIME_S: f64 = 3.0;
const DEFAULT_REPORT_PROVIDER: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_REPORT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_REPORT_TIMEOUT_S: u64 = 10;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PatrolConfigFile {
    sequence: Option<SequenceConfigFile>,
    model: Option<ModelConfigFile>,
    fusion: Option<FusionConfigFile>,
    alert: Option<AlertConfigFile>,
    report: Option<ReportConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SequenceConfigFile {
    sequence_root: Option<PathBuf>,
    rgb_dir: Option<PathBuf>,
    pointcloud_dir: Option<PathBuf>,
    timestamps_file: Option<PathBuf>,
    play_fps: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    backend: Option<String>,
    weights_path: Option<PathBuf>,
    input_size: Option<[u32; 2]>,
    class_names: Option<Vec<String>>,
    confidence: Option<f32>,
    iou: Option<f32>,
    detections_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FusionConfigFile {
    use_projection: Option<bool>,
    min_distance_m: Option<f64>,
    max_distance_m: Option<f64>,
    danger_zone: Option<DangerZoneConfigFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DangerZoneConfigFile {
    name: Option<String>,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlertConfigFile {
    stay_time_threshold_s: Option<f64>,
    watched_class: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ReportConfigFile {
    enabled: Option<bool>,
    provider: Option<String>,
    api_base: Option<String>,
    api_key_env: Option<String>,
    model_name: Option<String>,
    timeout_s: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PatrolConfig {
    pub sequence: SequenceSettings,
    pub model: ModelSettings,
    pub fusion: FusionSettings,
    pub alert: AlertSettings,
    pub report: ReportSettings,
}

#[derive(Debug, Clone)]
pub struct SequenceSettings {
    pub sequence_root: PathBuf,
    pub rgb_dir: PathBuf,
    pub pointcloud_dir: PathBuf,
    pub timestamps_file: PathBuf,
    /// Playback rate in frames per second. Zero or negative means unpaced.
    pub play_fps: f64,
}

impl SequenceSettings {
    pub fn rgb_path(&self) -> PathBuf {
        self.sequence_root.join(&self.rgb_dir)
    }

    pub fn pointcloud_path(&self) -> PathBuf {
        self.sequence_root.join(&self.pointcloud_dir)
    }

    pub fn timestamps_path(&self) -> PathBuf {
        self.sequence_root.join(&self.timestamps_file)
    }

    /// Seconds to wait between ticks.
    pub fn play_interval_s(&self) -> f64 {
        if self.play_fps <= 0.0 {
            0.0
        } else {
            1.0 / self.play_fps
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: BackendKind,
    pub weights_path: Option<PathBuf>,
    /// Model input as [width, height].
    pub input_size: [u32; 2],
    pub class_names: Vec<String>,
    pub confidence: f32,
    pub iou: f32,
    /// Pre-computed detections for the replay backend.
    pub detections_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub stay_time_threshold_s: f64,
    pub watched_class: String,
}

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub enabled: bool,
    pub provider: String,
    pub api_base: String,
    pub api_key_env: String,
    pub model_name: String,
    pub timeout_s: u64,
}

impl PatrolConfig {
    /// Load from `path`, falling back to `PATROL_CONFIG`, then to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("PATROL_CONFIG").ok().map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document directly. Environment overrides are not applied.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: PatrolConfigFile = toml::from_str(raw)
            .map_err(|e| PatrolError::Configuration(format!("invalid config: {}", e)))?;
        let mut cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PatrolConfigFile) -> Result<Self> {
        let seq = file.sequence.unwrap_or_default();
        let sequence = SequenceSettings {
            sequence_root: seq
                .sequence_root
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SEQUENCE_ROOT)),
            rgb_dir: seq.rgb_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_RGB_DIR)),
            pointcloud_dir: seq
                .pointcloud_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_POINTCLOUD_DIR)),
            timestamps_file: seq
                .timestamps_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TIMESTAMPS_FILE)),
            play_fps: seq.play_fps.unwrap_or(DEFAULT_PLAY_FPS),
        };

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            backend: model_file
                .backend
                .as_deref()
                .unwrap_or(DEFAULT_BACKEND)
                .parse()?,
            weights_path: model_file.weights_path,
            input_size: model_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            class_names: model_file
                .class_names
                .unwrap_or_else(crate::detect::default_class_names),
            confidence: model_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            iou: model_file.iou.unwrap_or(DEFAULT_IOU),
            detections_path: model_file.detections_path,
        };

        let fusion_file = file.fusion.unwrap_or_default();
        let danger_zone = match fusion_file.danger_zone {
            Some(zone) => DangerZone {
                name: zone.name.unwrap_or_else(|| DEFAULT_ZONE_NAME.to_string()),
                x_min: zone.x_min,
                x_max: zone.x_max,
                y_min: zone.y_min,
                y_max: zone.y_max,
            },
            None => {
                let [x_min, x_max, y_min, y_max] = DEFAULT_ZONE;
                DangerZone {
                    name: DEFAULT_ZONE_NAME.to_string(),
                    x_min,
                    x_max,
                    y_min,
                    y_max,
                }
            }
        };
        let fusion = FusionSettings {
            use_projection: fusion_file.use_projection.unwrap_or(false),
            danger_zone,
            min_distance_m: fusion_file.min_distance_m.unwrap_or(0.0),
            max_distance_m: fusion_file.max_distance_m.unwrap_or(0.0),
        };

        let alert_file = file.alert.unwrap_or_default();
        let alert = AlertSettings {
            stay_time_threshold_s: alert_file
                .stay_time_threshold_s
                .unwrap_or(DEFAULT_STAY_TIME_S),
            watched_class: alert_file
                .watched_class
                .unwrap_or_else(|| PERSON_CLASS.to_string()),
        };

        let report_file = file.report.unwrap_or_default();
        let report = ReportSettings {
            enabled: report_file.enabled.unwrap_or(false),
            provider: report_file
                .provider
                .unwrap_or_else(|| DEFAULT_REPORT_PROVIDER.to_string()),
            api_base: report_file
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key_env: report_file
                .api_key_env
                .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
            model_name: report_file
                .model_name
                .unwrap_or_else(|| DEFAULT_REPORT_MODEL.to_string()),
            timeout_s: report_file.timeout_s.unwrap_or(DEFAULT_REPORT_TIMEOUT_S),
        };

        Ok(Self {
            sequence,
            model,
            fusion,
            alert,
            report,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(root) = std::env::var("PATROL_SEQUENCE_ROOT") {
            if !root.trim().is_empty() {
                self.sequence.sequence_root = PathBuf::from(root);
            }
        }
        if let Ok(backend) = std::env::var("PATROL_BACKEND") {
            if !backend.trim().is_empty() {
                self.model.backend = backend.parse()?;
            }
        }
        if let Ok(stay) = std::env::var("PATROL_STAY_TIME_S") {
            self.alert.stay_time_threshold_s = stay.trim().parse().map_err(|_| {
                PatrolError::Configuration(
                    "PATROL_STAY_TIME_S must be a number of seconds".to_string(),
                )
            })?;
        }
        if let Ok(fps) = std::env::var("PATROL_PLAY_FPS") {
            self.sequence.play_fps = fps.trim().parse().map_err(|_| {
                PatrolError::Configuration("PATROL_PLAY_FPS must be a number".to_string())
            })?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let zone = &self.fusion.danger_zone;
        for (label, value) in [
            ("x_min", zone.x_min),
            ("x_max", zone.x_max),
            ("y_min", zone.y_min),
            ("y_max", zone.y_max),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(config_err(format!(
                    "danger_zone.{} must be within [0, 1], got {}",
                    label, value
                )));
            }
        }
        if zone.x_min > zone.x_max || zone.y_min > zone.y_max {
            return Err(config_err(
                "danger_zone minimum must not exceed maximum".to_string(),
            ));
        }

        let (min, max) = (self.fusion.min_distance_m, self.fusion.max_distance_m);
        if !min.is_finite() || !max.is_finite() || min < 0.0 || max < 0.0 {
            return Err(config_err(
                "min_distance_m and max_distance_m must be finite and >= 0".to_string(),
            ));
        }
        if min > 0.0 && max > 0.0 && min > max {
            return Err(config_err(format!(
                "min_distance_m ({}) exceeds max_distance_m ({})",
                min, max
            )));
        }

        let stay = self.alert.stay_time_threshold_s;
        if !stay.is_finite() || stay < 0.0 {
            return Err(config_err(
                "stay_time_threshold_s must be finite and >= 0".to_string(),
            ));
        }
        if self.alert.watched_class.trim().is_empty() {
            return Err(config_err("watched_class must not be empty".to_string()));
        }
        self.alert.watched_class = self.alert.watched_class.trim().to_string();

        if !(0.0..=1.0).contains(&self.model.confidence) || !(0.0..=1.0).contains(&self.model.iou)
        {
            return Err(config_err(
                "model confidence and iou must be within [0, 1]".to_string(),
            ));
        }
        if self.model.input_size.contains(&0) {
            return Err(config_err("model input_size must be non-zero".to_string()));
        }
        if !self.sequence.play_fps.is_finite() {
            return Err(config_err("play_fps must be finite".to_string()));
        }
        Ok(())
    }
}

fn config_err(msg: String) -> PatrolError {
    PatrolError::Configuration(msg)
}

fn read_config_file(path: &Path) -> Result<PatrolConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PatrolError::Configuration(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    toml::from_str(&raw).map_err(|e| {
        PatrolError::Configuration(format!("invalid config file {}: {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = PatrolConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.model.backend, BackendKind::Stub);
        assert_eq!(cfg.alert.watched_class, "person");
        assert_eq!(cfg.sequence.play_interval_s(), 0.1);
    }

    #[test]
    fn zero_fps_means_unpaced() {
        let mut cfg = PatrolConfig::from_toml_str("").unwrap();
        cfg.sequence.play_fps = 0.0;
        assert_eq!(cfg.sequence.play_interval_s(), 0.0);
    }

    #[test]
    fn rejects_inverted_zone() {
        let err = PatrolConfig::from_toml_str(
            "[fusion.danger_zone]\nx_min = 0.6\nx_max = 0.4\ny_min = 0.0\ny_max = 1.0\n",
        )
        .unwrap_err();
        assert!(matches!(err, PatrolError::Configuration(_)));
    }

    #[test]
    fn rejects_unknown_backend() {
        let err = PatrolConfig::from_toml_str("[model]\nbackend = \"quantum\"\n").unwrap_err();
        assert!(matches!(err, PatrolError::Configuration(_)));
    }

    #[test]
    fn rejects_inverted_distance_bounds() {
        let err =
            PatrolConfig::from_toml_str("[fusion]\nmin_distance_m = 10.0\nmax_distance_m = 2.0\n")
                .unwrap_err();
        assert!(matches!(err, PatrolError::Configuration(_)));
    }

    #[test]
    fn rejects_mistyped_section_keys() {
        for raw in [
            "[fusion]\nmin_distance = 2.0\n",
            "[sequence]\nplay_rate = 5.0\n",
            "[alert]\nstay_time_s = 1.0\n",
            "[fusion.danger_zone]\nx_min = 0.1\nx_max = 0.5\ny_min = 0.1\ny_max = 0.5\nkind = 1",
        ] {
            let err = PatrolConfig::from_toml_str(raw).unwrap_err();
            assert!(matches!(err, PatrolError::Configuration(_)), "{raw}");
        }
    }

    #[test]
    fn paths_join_sequence_root() {
        let cfg = PatrolConfig::from_toml_str(
            "[sequence]\nsequence_root = \"/data/run1\"\nrgb_dir = \"image_02\"\n",
        )
        .unwrap();
        assert_eq!(cfg.sequence.rgb_path(), PathBuf::from("/data/run1/image_02"));
        assert_eq!(
            cfg.sequence.timestamps_path(),
            PathBuf::from("/data/run1/timestamps.txt")
        );
    }
}
