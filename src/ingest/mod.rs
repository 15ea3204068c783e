//! Frame ingestion from recorded sequences.
//!
//! This module provides:
//! - `FrameStore`: aligned image / point set / timestamp replay
//! - point-set decoders for `.pcd` and flat `.bin` lidar dumps
//!
//! The ingestion layer is responsible for:
//! - Validating stream alignment once, at open time
//! - Decoding exactly one frame per request
//!
//! The ingestion layer MUST NOT:
//! - Materialize the whole sequence in memory
//! - Cache frames across ticks

pub mod pointcloud;
pub mod sequence;

pub use pointcloud::{decode_point_set, read_point_set, PointSetFormat};
pub use sequence::{FrameStore, Frames};
