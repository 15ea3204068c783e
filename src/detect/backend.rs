use anyhow::Result;

use crate::detect::result::DetectionSet;
use crate::frame::Frame;

/// Detector backend trait.
///
/// # Boundary
///
/// Backends are the inference collaborator of the pipeline. The fusion core
/// only ever sees the `DetectionSet` they return. Implementations:
/// - receive the frame read-only and must not retain it past `infer`
/// - report boxes in the frame's own pixel space
/// - stamp the result with the frame's timestamp
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Load weights or other resources. Called once before the first `infer`.
    fn load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Run detection on a frame.
    fn infer(&mut self, frame: &Frame) -> Result<DetectionSet>;
}
