//! Patrol fusion kernel
//!
//! This crate fuses per-frame 2D detections with synchronized lidar point
//! clouds and decides when a person has stayed inside a danger zone for too
//! long.
//!
//! # Architecture
//!
//! One tick consumes exactly one aligned frame:
//!
//! 1. **Frame Store** (`ingest`): index-aligned image, point set and timestamp.
//! 2. **Inference** (`detect`): a backend turns the image into detections.
//! 3. **Fusion** (`fusion::engine`): detections + point set become targets
//!    with a distance and a danger-zone flag.
//! 4. **Zone Monitor** (`fusion::zone`): targets + timestamp become a
//!    level-triggered alert and a dwell time.
//! 5. **Report** (`report`): alert edges become events and a patrol summary.
//!
//! # Module Structure
//!
//! - `frame`: Frame triple and point set containers
//! - `ingest`: Frame Store and point-set decoders
//! - `detect`: Inference backends behind one trait
//! - `fusion`: Fusion Engine and Zone Monitor
//! - `report`: Alert edge detection, narration, patrol report
//! - `pipeline`: Tick loop tying the pieces together
//! - `config`: TOML configuration with environment overrides
//! - `error`: Typed errors for the core
//! - `ui`: Stage spinners and replay progress for the binaries
//! - Core types: Distance, Target, AlertEvent, PatrolReport

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod fusion;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod ui;

pub use config::PatrolConfig;
pub use detect::{
    create_backend, BBox, BackendKind, Detection, DetectionSet, DetectorBackend, ReplayBackend,
    StubBackend,
};
pub use error::{PatrolError, Result};
pub use frame::{Frame, PointSet};
pub use fusion::{
    estimate_distance, DangerZone, FusionEngine, FusionSettings, ZoneDecision, ZoneMonitor,
    ZoneState, ZoneTracking,
};
pub use ingest::{FrameStore, PointSetFormat};
pub use pipeline::{Control, FrameSink, LogSink, Pipeline, RunSummary, TickOutcome};
pub use report::{AlertRecorder, ReportGenerator, TemplateGenerator, TextGenerator};

/// Class label that the zone monitor watches unless configured otherwise.
pub const PERSON_CLASS: &str = "person";

// -------------------- Distance --------------------

/// Range estimate for a target.
///
/// `Undefined` means "no usable range data" for the frame. It is a value, not
/// an error, and consumers must pass it through without failing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Distance {
    Meters(f64),
    #[default]
    Undefined,
}

impl Distance {
    pub fn meters(&self) -> Option<f64> {
        match self {
            Distance::Meters(m) => Some(*m),
            Distance::Undefined => None,
        }
    }
}

impl From<Option<f64>> for Distance {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(m) if !m.is_nan() => Distance::Meters(m),
            _ => Distance::Undefined,
        }
    }
}

impl From<Distance> for Option<f64> {
    fn from(value: Distance) -> Self {
        value.meters()
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Meters(m) => write!(f, "{:.1}m", m),
            Distance::Undefined => f.write_str("n/a"),
        }
    }
}

// -------------------- Targets --------------------

/// A detection enriched with a distance and zone membership. Lives one tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Target {
    pub class_name: String,
    pub distance: Distance,
    pub in_danger_zone: bool,
    pub bbox: BBox,
    pub timestamp: f64,
}

impl Target {
    /// True when this target satisfies the zone monitor's condition for `class_name`.
    pub fn qualifies(&self, class_name: &str) -> bool {
        self.in_danger_zone && self.class_name == class_name
    }
}

// -------------------- Alert Events --------------------

/// One contiguous dwell episode that crossed the stay-time threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub timestamp: f64,
    pub class_name: String,
    pub distance: Distance,
    pub zone_name: String,
    pub dwell_s: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
}

/// Ordered alert events for one run plus a textual summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PatrolReport {
    pub events: Vec<AlertEvent>,
    pub start_time: f64,
    pub end_time: f64,
    pub summary_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_nan_becomes_undefined() {
        assert_eq!(Distance::from(Some(f64::NAN)), Distance::Undefined);
        assert_eq!(Distance::from(None), Distance::Undefined);
        assert_eq!(Distance::from(Some(2.5)), Distance::Meters(2.5));
    }

    #[test]
    fn distance_serializes_as_optional_number() {
        let json = serde_json::to_string(&Distance::Undefined).unwrap();
        assert_eq!(json, "null");
        let json = serde_json::to_string(&Distance::Meters(4.0)).unwrap();
        assert_eq!(json, "4.0");
    }

    #[test]
    fn distance_display() {
        assert_eq!(Distance::Meters(3.04).to_string(), "3.0m");
        assert_eq!(Distance::Undefined.to_string(), "n/a");
    }
}
