use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionSet;
use crate::frame::Frame;

/// Placeholder for accelerator backends that are not wired up yet.
/// Loads instantly and never detects anything.
#[derive(Default)]
pub struct StubBackend {
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame) -> Result<DetectionSet> {
        self.frames_seen += 1;
        Ok(DetectionSet::empty(frame.timestamp))
    }
}
