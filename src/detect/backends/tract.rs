#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::registry::default_class_names;
use crate::detect::result::{non_max_suppression, BBox, Detection, DetectionSet};
use crate::frame::Frame;

/// Box coordinates (cx, cy, w, h) precede the class scores in each anchor.
const CXYWH_OFFSET: usize = 4;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>>;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// The model is expected to take a `[1, 3, H, W]` f32 tensor scaled to 0..1
/// and produce `[1, 4 + classes, anchors]` (or its transpose). The frame is
/// resized to the model input without letterboxing and boxes are scaled back
/// to the frame's pixel space.
pub struct TractBackend {
    model_path: PathBuf,
    model: Option<Plan>,
    width: u32,
    height: u32,
    class_names: Vec<String>,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            model: None,
            width,
            height,
            class_names: default_class_names(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }

    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = class_names;
        self
    }

    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = imageops::resize(&frame.image, self.width, self.height, FilterType::Triangle);
        tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        )
        .into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not rank 3")?;

        let attrs = CXYWH_OFFSET + self.class_names.len();
        let shape = view.shape();
        let transposed = if shape[1] == attrs {
            false
        } else if shape[2] == attrs {
            true
        } else {
            return Err(anyhow!(
                "model output shape {:?} does not match {} classes",
                shape,
                self.class_names.len()
            ));
        };
        let anchors = if transposed { shape[1] } else { shape[2] };
        let value = |attr: usize, anchor: usize| {
            if transposed {
                view[[0, anchor, attr]]
            } else {
                view[[0, attr, anchor]]
            }
        };

        let sx = frame.width() as f32 / self.width as f32;
        let sy = frame.height() as f32 / self.height as f32;
        let (fw, fh) = (frame.width() as f32, frame.height() as f32);

        let mut detections = Vec::new();
        for anchor in 0..anchors {
            let Some((class_id, confidence)) = (0..self.class_names.len())
                .map(|c| (c, value(CXYWH_OFFSET + c, anchor)))
                .max_by(|a, b| a.1.total_cmp(&b.1))
            else {
                continue;
            };
            if confidence < self.confidence_threshold {
                continue;
            }
            let cx = value(0, anchor) * sx;
            let cy = value(1, anchor) * sy;
            let w = value(2, anchor) * sx;
            let h = value(3, anchor) * sy;
            let bbox = BBox::new(
                (cx - w / 2.0).clamp(0.0, fw),
                (cy - h / 2.0).clamp(0.0, fh),
                (cx + w / 2.0).clamp(0.0, fw),
                (cy + h / 2.0).clamp(0.0, fh),
            );
            detections.push(Detection {
                class_id: class_id as u32,
                class_name: self.class_names[class_id].clone(),
                confidence: confidence.clamp(0.0, 1.0),
                bbox,
            });
        }
        non_max_suppression(&mut detections, self.iou_threshold);
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn load(&mut self) -> Result<()> {
        let model = tract_onnx::onnx()
            .model_for_path(&self.model_path)
            .with_context(|| {
                format!(
                    "failed to load ONNX model from {}",
                    self.model_path.display()
                )
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, self.height as usize, self.width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;
        log::info!(
            "TractBackend: loaded {} ({}x{}, {} classes)",
            self.model_path.display(),
            self.width,
            self.height,
            self.class_names.len()
        );
        self.model = Some(model);
        Ok(())
    }

    fn infer(&mut self, frame: &Frame) -> Result<DetectionSet> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| anyhow!("tract backend not loaded; call load() first"))?;
        let input = self.build_input(frame);
        let outputs = model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let detections = self.decode(outputs, frame)?;
        Ok(DetectionSet {
            detections,
            timestamp: frame.timestamp,
        })
    }
}
