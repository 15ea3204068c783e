//! Frame triple and point set containers.
//!
//! - `PointSet`: unordered lidar points for one frame, sensor coordinates.
//! - `Frame`: image + point set + timestamp at one sequence index.
//!
//! Frames are produced by the Frame Store one at a time and dropped at the end
//! of the tick that consumed them. Nothing here is cached across frames.

use image::RgbImage;

// ----------------------------------------------------------------------------
// PointSet
// ----------------------------------------------------------------------------

/// Unordered 3D points (x, y, z in meters). May be empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointSet {
    points: Vec<[f32; 3]>,
}

impl PointSet {
    pub fn new(points: Vec<[f32; 3]>) -> Self {
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[[f32; 3]] {
        &self.points
    }

    /// Euclidean norm of every point, in input order. NaN coordinates yield NaN norms.
    pub fn norms(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|[x, y, z]| {
            let (x, y, z) = (*x as f64, *y as f64, *z as f64);
            (x * x + y * y + z * z).sqrt()
        })
    }
}

impl From<Vec<[f32; 3]>> for PointSet {
    fn from(points: Vec<[f32; 3]>) -> Self {
        Self::new(points)
    }
}

impl FromIterator<[f32; 3]> for PointSet {
    fn from_iter<I: IntoIterator<Item = [f32; 3]>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One aligned (image, point set, timestamp) record.
pub struct Frame {
    /// Sequence position in the store.
    pub index: usize,
    /// Decoded RGB image.
    pub image: RgbImage,
    /// Point set captured alongside the image.
    pub points: PointSet,
    /// Capture time in seconds.
    pub timestamp: f64,
}

impl Frame {
    pub fn new(index: usize, image: RgbImage, points: PointSet, timestamp: f64) -> Self {
        Self {
            index,
            image,
            points,
            timestamp,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("points", &self.points.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}
