use serde::{Deserialize, Serialize};

/// Axis-aligned pixel box, corners (x1, y1) top-left and (x2, y2) bottom-right.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    /// Build a box from two corners in any order; stored with x1<=x2 and y1<=y2.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x1 as f64 + self.x2 as f64) / 2.0,
            (self.y1 as f64 + self.y2 as f64) / 2.0,
        )
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

impl From<[f32; 4]> for BBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One 2D detection in the frame's pixel space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub class_id: u32,
    pub class_name: String,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub bbox: BBox,
}

/// Detections produced by a backend for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    pub detections: Vec<Detection>,
    /// Timestamp of the frame the detections belong to.
    pub timestamp: f64,
}

impl DetectionSet {
    pub fn empty(timestamp: f64) -> Self {
        Self {
            detections: Vec::new(),
            timestamp,
        }
    }
}

/// Greedy class-agnostic non-maximum suppression, highest confidence first.
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let overlaps = (0..kept)
            .any(|prev| detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold);
        if !overlaps {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}
