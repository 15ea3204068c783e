//! Fusion Engine: detections + point set -> targets.
//!
//! Every detection is handled independently:
//! - zone membership from the normalized bbox center
//! - distance as the median range of the frame's point set
//!
//! The whole frame's point set is used for every detection. There is no
//! per-detection cropping and no camera-to-lidar projection; `use_projection`
//! is carried in the settings but does not change the computation.

use serde::Serialize;

use crate::detect::{BBox, DetectionSet};
use crate::frame::PointSet;
use crate::{Distance, Target};

/// Normalized danger-zone rectangle inside [0, 1]^2.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DangerZone {
    pub name: String,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl DangerZone {
    /// Inclusive point test in normalized image coordinates.
    pub fn contains(&self, cx: f64, cy: f64) -> bool {
        self.x_min <= cx && cx <= self.x_max && self.y_min <= cy && cy <= self.y_max
    }

    /// Test the center of a pixel-space bbox for an image of the given size.
    ///
    /// A zero-sized image yields non-finite centers, which never test inside.
    pub fn contains_bbox(&self, bbox: &BBox, image_height: u32, image_width: u32) -> bool {
        let (cx, cy) = bbox.center();
        self.contains(cx / image_width as f64, cy / image_height as f64)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FusionSettings {
    /// Parsed and logged only; distance never depends on it.
    pub use_projection: bool,
    pub danger_zone: DangerZone,
    /// Ranges below this are discarded when > 0.
    pub min_distance_m: f64,
    /// Ranges above this are discarded when > 0.
    pub max_distance_m: f64,
}

pub struct FusionEngine {
    settings: FusionSettings,
}

impl FusionEngine {
    pub fn new(settings: FusionSettings) -> Self {
        if settings.use_projection {
            log::info!(
                "FusionEngine: use_projection is set but distances use the whole point set"
            );
        }
        Self { settings }
    }

    pub fn danger_zone(&self) -> &DangerZone {
        &self.settings.danger_zone
    }

    /// Produce one target per detection. Never fails.
    pub fn fuse(
        &self,
        detections: &DetectionSet,
        points: &PointSet,
        image_height: u32,
        image_width: u32,
    ) -> Vec<Target> {
        if detections.detections.is_empty() {
            return Vec::new();
        }
        let distance = estimate_distance(
            points,
            self.settings.min_distance_m,
            self.settings.max_distance_m,
        );
        detections
            .detections
            .iter()
            .map(|detection| Target {
                class_name: detection.class_name.clone(),
                distance,
                in_danger_zone: self.settings.danger_zone.contains_bbox(
                    &detection.bbox,
                    image_height,
                    image_width,
                ),
                bbox: detection.bbox,
                timestamp: detections.timestamp,
            })
            .collect()
    }
}

/// Median range of `points` after optional range gating.
///
/// NaN ranges are dropped first. `min_m`/`max_m` are each active only when
/// > 0. If gating removes every range, the ungated ranges are used instead.
pub fn estimate_distance(points: &PointSet, min_m: f64, max_m: f64) -> Distance {
    let ranges: Vec<f64> = points.norms().filter(|r| !r.is_nan()).collect();
    if ranges.is_empty() {
        return Distance::Undefined;
    }
    let mut gated: Vec<f64> = ranges
        .iter()
        .copied()
        .filter(|r| min_m <= 0.0 || *r >= min_m)
        .filter(|r| max_m <= 0.0 || *r <= max_m)
        .collect();
    if gated.is_empty() {
        gated = ranges;
    }
    median(&mut gated)
}

fn median(values: &mut [f64]) -> Distance {
    if values.is_empty() {
        return Distance::Undefined;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    let m = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    Distance::Meters(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Detection;

    fn zone() -> DangerZone {
        DangerZone {
            name: "zone".to_string(),
            x_min: 0.4,
            x_max: 0.6,
            y_min: 0.4,
            y_max: 0.6,
        }
    }

    fn ranges(values: &[f32]) -> PointSet {
        values.iter().map(|v| [*v, 0.0, 0.0]).collect()
    }

    #[test]
    fn zone_membership_uses_bbox_center() {
        let zone = zone();
        assert!(zone.contains_bbox(&BBox::new(45.0, 45.0, 55.0, 55.0), 100, 100));
        assert!(!zone.contains_bbox(&BBox::new(0.0, 0.0, 10.0, 10.0), 100, 100));
    }

    #[test]
    fn zone_edges_are_inclusive() {
        let zone = zone();
        // center (40, 60) -> (0.4, 0.6)
        assert!(zone.contains_bbox(&BBox::new(30.0, 50.0, 50.0, 70.0), 100, 100));
    }

    #[test]
    fn zero_sized_image_is_never_in_zone() {
        let zone = DangerZone {
            x_min: 0.0,
            x_max: 1.0,
            y_min: 0.0,
            y_max: 1.0,
            ..zone()
        };
        assert!(!zone.contains_bbox(&BBox::new(1.0, 1.0, 2.0, 2.0), 0, 0));
    }

    #[test]
    fn median_without_bounds() {
        let d = estimate_distance(&ranges(&[5.0, 1.0, 4.0, 2.0, 3.0]), 0.0, 0.0);
        assert_eq!(d, Distance::Meters(3.0));
    }

    #[test]
    fn median_with_bounds() {
        let d = estimate_distance(&ranges(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2.0, 4.0);
        assert_eq!(d, Distance::Meters(3.0));
    }

    #[test]
    fn even_count_averages_middle_pair() {
        let d = estimate_distance(&ranges(&[1.0, 2.0, 3.0, 4.0]), 0.0, 0.0);
        assert_eq!(d, Distance::Meters(2.5));
    }

    #[test]
    fn empty_gate_falls_back_to_all_ranges() {
        let d = estimate_distance(&ranges(&[1.0, 2.0, 3.0, 4.0, 5.0]), 10.0, 0.0);
        assert_eq!(d, Distance::Meters(3.0));
    }

    #[test]
    fn empty_and_nan_clouds_are_undefined() {
        assert_eq!(estimate_distance(&PointSet::empty(), 0.0, 0.0), Distance::Undefined);
        let nan = PointSet::new(vec![[f32::NAN, 0.0, 0.0], [0.0, f32::NAN, 1.0]]);
        assert_eq!(estimate_distance(&nan, 0.0, 0.0), Distance::Undefined);
    }

    #[test]
    fn nan_points_are_ignored() {
        let set = PointSet::new(vec![[f32::NAN, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        assert_eq!(estimate_distance(&set, 0.0, 0.0), Distance::Meters(2.0));
    }

    #[test]
    fn fuse_is_one_target_per_detection_and_repeatable() {
        let engine = FusionEngine::new(FusionSettings {
            use_projection: true,
            danger_zone: zone(),
            min_distance_m: 0.0,
            max_distance_m: 0.0,
        });
        let detections = DetectionSet {
            detections: vec![
                Detection {
                    class_id: 0,
                    class_name: "person".to_string(),
                    confidence: 0.9,
                    bbox: BBox::new(45.0, 45.0, 55.0, 55.0),
                },
                Detection {
                    class_id: 2,
                    class_name: "car".to_string(),
                    confidence: 0.7,
                    bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
                },
            ],
            timestamp: 4.0,
        };
        let points = ranges(&[1.0, 2.0, 3.0]);

        let targets = engine.fuse(&detections, &points, 100, 100);
        assert_eq!(targets.len(), 2);
        assert!(targets[0].in_danger_zone);
        assert!(!targets[1].in_danger_zone);
        assert!(targets.iter().all(|t| t.distance == Distance::Meters(2.0)));
        assert!(targets.iter().all(|t| t.timestamp == 4.0));
        assert_eq!(targets[1].class_name, "car");

        assert_eq!(engine.fuse(&detections, &points, 100, 100), targets);
    }

    #[test]
    fn fuse_without_detections_is_empty() {
        let engine = FusionEngine::new(FusionSettings {
            use_projection: false,
            danger_zone: zone(),
            min_distance_m: 0.0,
            max_distance_m: 0.0,
        });
        let targets = engine.fuse(&DetectionSet::empty(1.0), &PointSet::empty(), 10, 10);
        assert!(targets.is_empty());
    }
}
