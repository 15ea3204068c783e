//! Fusion core: target construction and zone dwell tracking.
//!
//! Both components are synchronous and deterministic. Degenerate input gives
//! degenerate data (no targets, undefined distance, no alert), never an error.

pub mod engine;
pub mod zone;

pub use engine::{estimate_distance, DangerZone, FusionEngine, FusionSettings};
pub use zone::{ZoneDecision, ZoneMonitor, ZoneState, ZoneTracking};
