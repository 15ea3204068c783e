use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;
use super::backends::{ReplayBackend, StubBackend};
use crate::config::ModelSettings;
use crate::error::PatrolError;

/// The closed set of inference backends a configuration can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Accelerator placeholder. Always returns no detections.
    Stub,
    /// Pre-computed detections read from a JSON file.
    Replay,
    /// ONNX detector run on CPU through tract.
    Tract,
}

impl FromStr for BackendKind {
    type Err = PatrolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" | "ascend" => Ok(Self::Stub),
            "replay" => Ok(Self::Replay),
            "cpu" | "tract" | "onnx" => Ok(Self::Tract),
            other => Err(PatrolError::Configuration(format!(
                "unknown backend '{}' (expected stub, replay or tract)",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stub => "stub",
            Self::Replay => "replay",
            Self::Tract => "tract",
        })
    }
}

/// Build the configured backend. The returned backend still needs `load()`.
pub fn create_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend {
        BackendKind::Stub => Ok(Box::new(StubBackend::new())),
        BackendKind::Replay => {
            let path = settings
                .detections_path
                .clone()
                .ok_or_else(|| anyhow!("replay backend requires model.detections_path"))?;
            Ok(Box::new(ReplayBackend::new(path)))
        }
        BackendKind::Tract => create_tract(settings),
    }
}

#[cfg(feature = "backend-tract")]
fn create_tract(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    let weights = settings
        .weights_path
        .clone()
        .ok_or_else(|| anyhow!("tract backend requires model.weights_path"))?;
    let [width, height] = settings.input_size;
    let backend = super::backends::TractBackend::new(weights, width, height)
        .with_class_names(settings.class_names.clone())
        .with_thresholds(settings.confidence, settings.iou);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn create_tract(_settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!("tract backend requires the backend-tract feature"))
}

/// COCO class names in model output order.
pub fn default_class_names() -> Vec<String> {
    [
        "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
        "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
        "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
        "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
        "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
        "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
        "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
        "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
        "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
        "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
        "toothbrush",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_aliases() {
        assert_eq!("stub".parse::<BackendKind>().unwrap(), BackendKind::Stub);
        assert_eq!("Ascend".parse::<BackendKind>().unwrap(), BackendKind::Stub);
        assert_eq!(" replay ".parse::<BackendKind>().unwrap(), BackendKind::Replay);
        assert_eq!("cpu".parse::<BackendKind>().unwrap(), BackendKind::Tract);
        assert!("gpu-magic".parse::<BackendKind>().is_err());
    }

    #[test]
    fn coco_names_start_with_person() {
        let names = default_class_names();
        assert_eq!(names.len(), 80);
        assert_eq!(names[0], "person");
    }
}
