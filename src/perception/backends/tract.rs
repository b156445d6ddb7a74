#![cfg(feature = "backend-tract")]

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use tract_onnx::prelude::*;

use crate::error::RunnerError;
use crate::perception::runner::{DepthEstimator, ObjectDetector, RawDetection};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>>;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Load a fixed-shape ONNX model. A missing file is `Unavailable`, a broken one `Failed`.
fn load_plan(model_path: &Path, width: usize, height: usize) -> Result<Plan, RunnerError> {
    if !model_path.is_file() {
        return Err(RunnerError::unavailable(format!(
            "model file {} not found",
            model_path.display()
        )));
    }
    let failed = |what: &str, e: TractError| {
        RunnerError::failed(format!("{} ({}): {}", what, model_path.display(), e))
    };
    tract_onnx::onnx()
        .model_for_path(model_path)
        .map_err(|e| failed("failed to load ONNX model", e))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, height, width)),
        )
        .map_err(|e| failed("failed to set input fact", e))?
        .into_optimized()
        .map_err(|e| failed("failed to optimize ONNX model", e))?
        .into_runnable()
        .map_err(|e| failed("failed to build runnable ONNX model", e))
}

fn run_plan(plan: &Plan, input: Tensor) -> Result<TVec<TValue>, RunnerError> {
    plan.run(tvec!(input.into()))
        .map_err(|e| RunnerError::failed(format!("ONNX inference failed: {}", e)))
}

fn to_tensor(image: &RgbImage, size: u32, normalize: impl Fn(usize, u8) -> f32) -> Tensor {
    let resized = imageops::resize(image, size, size, FilterType::Triangle);
    let side = size as usize;
    tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        normalize(c, resized.get_pixel(x as u32, y as u32)[c])
    })
    .into_tensor()
}

// ----------------------------------------------------------------------------
// MiDaS depth
// ----------------------------------------------------------------------------

/// MiDaS-family depth estimator exported to ONNX.
pub struct OnnxDepth {
    plan: Plan,
    input_size: u32,
}

impl OnnxDepth {
    /// `DPT_*` exports take 384x384 input, `MiDaS_small` takes 256x256.
    pub fn load(model_path: &Path, model_name: &str) -> Result<Self, RunnerError> {
        let input_size = if model_name.starts_with("DPT") { 384 } else { 256 };
        let plan = load_plan(model_path, input_size as usize, input_size as usize)?;
        log::info!("loaded depth model {} ({}px)", model_path.display(), input_size);
        Ok(Self { plan, input_size })
    }
}

impl DepthEstimator for OnnxDepth {
    fn name(&self) -> &'static str {
        "midas-onnx"
    }

    fn estimate(&mut self, image: &RgbImage) -> Result<GrayImage, RunnerError> {
        let input = to_tensor(image, self.input_size, |c, v| {
            (v as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
        });
        let outputs = run_plan(&self.plan, input)?;
        let output = outputs
            .first()
            .ok_or_else(|| RunnerError::failed("depth model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| RunnerError::failed(format!("depth output was not f32: {}", e)))?;

        let shape = view.shape();
        let (oh, ow) = match shape.len() {
            4 => (shape[2], shape[3]),
            3 => (shape[1], shape[2]),
            2 => (shape[0], shape[1]),
            _ => {
                return Err(RunnerError::failed(format!(
                    "unexpected depth output shape {:?}",
                    shape
                )))
            }
        };

        let values: Vec<f32> = view.iter().copied().collect();
        let (min_d, max_d) = values
            .iter()
            .fold((f32::MAX, f32::MIN), |(mn, mx), &v| (mn.min(v), mx.max(v)));
        let range = (max_d - min_d).max(1e-6);
        let pixels: Vec<u8> = values
            .iter()
            .take(oh * ow)
            .map(|&v| ((v - min_d) / range * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();

        let depth = GrayImage::from_raw(ow as u32, oh as u32, pixels)
            .ok_or_else(|| RunnerError::failed("depth output size mismatch"))?;
        Ok(imageops::resize(
            &depth,
            image.width(),
            image.height(),
            FilterType::Triangle,
        ))
    }
}

// ----------------------------------------------------------------------------
// YOLOv8 detection
// ----------------------------------------------------------------------------

const YOLO_INPUT: u32 = 640;

/// YOLOv8 detector exported to ONNX (`[1, 4 + classes, anchors]` output).
pub struct OnnxDetector {
    plan: Plan,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl OnnxDetector {
    pub fn load(model_path: &Path) -> Result<Self, RunnerError> {
        let plan = load_plan(model_path, YOLO_INPUT as usize, YOLO_INPUT as usize)?;
        log::info!("loaded detector model {}", model_path.display());
        Ok(Self {
            plan,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        })
    }
}

impl ObjectDetector for OnnxDetector {
    fn name(&self) -> &'static str {
        "yolov8-onnx"
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<RawDetection>, RunnerError> {
        let input = to_tensor(image, YOLO_INPUT, |_, v| v as f32 / 255.0);
        let outputs = run_plan(&self.plan, input)?;
        let output = outputs
            .first()
            .ok_or_else(|| RunnerError::failed("detector produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| RunnerError::failed(format!("detector output was not f32: {}", e)))?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .map_err(|e| RunnerError::failed(format!("unexpected detector output: {}", e)))?;

        let (channels, anchors) = (view.shape()[1], view.shape()[2]);
        if channels <= 4 {
            return Err(RunnerError::failed(format!(
                "detector output has {} channels",
                channels
            )));
        }
        let sx = image.width() as f64 / YOLO_INPUT as f64;
        let sy = image.height() as f64 / YOLO_INPUT as f64;

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let mut best = (0usize, f32::MIN);
            for c in 4..channels {
                let score = view[[0, c, i]];
                if score > best.1 {
                    best = (c - 4, score);
                }
            }
            if best.1 < self.confidence_threshold {
                continue;
            }
            let (cx, cy) = (view[[0, 0, i]] as f64, view[[0, 1, i]] as f64);
            let (w, h) = (view[[0, 2, i]] as f64, view[[0, 3, i]] as f64);
            candidates.push(RawDetection {
                bbox: [
                    (cx - w / 2.0) * sx,
                    (cy - h / 2.0) * sy,
                    (cx + w / 2.0) * sx,
                    (cy + h / 2.0) * sy,
                ],
                class_id: best.0 as i64,
                confidence: best.1,
            });
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(suppress(candidates, self.iou_threshold))
    }
}

/// Greedy per-class non-maximum suppression over score-sorted candidates.
fn suppress(candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold as f64
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area = |r: &[f64; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f64; 4], class_id: i64, confidence: f32) -> RawDetection {
        RawDetection {
            bbox,
            class_id,
            confidence,
        }
    }

    #[test]
    fn suppresses_same_class_overlaps_only() {
        let kept = suppress(
            vec![
                det([0.0, 0.0, 10.0, 10.0], 57, 0.9),
                det([1.0, 1.0, 10.0, 10.0], 57, 0.8),
                det([1.0, 1.0, 10.0, 10.0], 62, 0.7),
                det([50.0, 50.0, 60.0, 60.0], 57, 0.6),
            ],
            0.45,
        );
        let scores: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.6]);
    }

    #[test]
    fn missing_model_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = OnnxDetector::load(&dir.path().join("yolov8n.onnx")).err().unwrap();
        assert!(err.is_unavailable());
        let err = OnnxDepth::load(&dir.path().join("MiDaS_small.onnx"), "MiDaS_small")
            .err()
            .unwrap();
        assert!(err.is_unavailable());
    }
}
