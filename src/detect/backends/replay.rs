use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionSet};
use crate::frame::Frame;

/// On-disk layout: one detection list per frame index.
#[derive(Debug, Deserialize)]
struct ReplayFile {
    frames: Vec<Vec<Detection>>,
}

/// Backend that replays detections recorded by an offline detector run.
///
/// Frames past the end of the recording get an empty detection set.
pub struct ReplayBackend {
    path: PathBuf,
    frames: Option<Vec<Vec<Detection>>>,
}

impl ReplayBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frames: None,
        }
    }

    /// Build an already-loaded backend from in-memory detections.
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            path: PathBuf::new(),
            frames: Some(frames),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ReplayFile = serde_json::from_str(raw).context("invalid replay detections")?;
        Ok(Self::from_frames(file.frames))
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn load(&mut self) -> Result<()> {
        if self.frames.is_some() {
            return Ok(());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading replay detections {}", self.path.display()))?;
        let file: ReplayFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing replay detections {}", self.path.display()))?;
        log::info!(
            "ReplayBackend: loaded {} frames of detections from {}",
            file.frames.len(),
            self.path.display()
        );
        self.frames = Some(file.frames);
        Ok(())
    }

    fn infer(&mut self, frame: &Frame) -> Result<DetectionSet> {
        let frames = self
            .frames
            .as_ref()
            .ok_or_else(|| anyhow!("replay backend not loaded; call load() first"))?;
        let detections = frames.get(frame.index).cloned().unwrap_or_default();
        Ok(DetectionSet {
            detections,
            timestamp: frame.timestamp,
        })
    }
}
