//! Perception: depth estimation, object detection and box-prompted segmentation over one
//! image, normalized into a `SceneFrame`.
//!
//! Artifacts are written into the frame's own directory:
//! `depth_{id}.png`, `detections_{id}.json`, `masks/mask_{class}_{NNNN}.png`.
//! Record paths are relative to that directory.

mod backends;
mod bbox;
mod classes;
mod runner;

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PipelineError, PipelineResult, RunnerError};
use crate::preset::PresetConfig;
use crate::scene::{BBox, BBoxEntry, MaskEntry, SceneFrame};

pub use backends::{BoxSegmenter, UnavailableRunner};
#[cfg(feature = "backend-tract")]
pub use backends::{OnnxDepth, OnnxDetector};
pub use bbox::expand_bbox;
pub use classes::{class_name, COCO_CLASSES};
pub use runner::{DepthEstimator, ObjectDetector, RawDetection, Segmenter};

/// Long-lived perception handles, constructed once per run.
pub struct PerceptionRunners {
    pub depth: Box<dyn DepthEstimator>,
    pub detector: Box<dyn ObjectDetector>,
    pub segmenter: Box<dyn Segmenter>,
}

impl PerceptionRunners {
    /// Depth and detection report `Unavailable`; segmentation stays in box mode.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            depth: Box::new(UnavailableRunner::new(reason)),
            detector: Box::new(UnavailableRunner::new(reason)),
            segmenter: Box::new(BoxSegmenter::new()),
        }
    }

    /// Load the preset's models from `models_dir`. Models that cannot be loaded are replaced
    /// by unavailable runners.
    pub fn for_preset(preset: &PresetConfig, models_dir: &Path) -> Self {
        if preset.sam_mode != "box-only" {
            log::info!(
                "segmentation mode {} runs as box masks",
                preset.sam_mode
            );
        }
        Self {
            depth: depth_runner(preset, models_dir),
            detector: detector_runner(preset, models_dir),
            segmenter: Box::new(BoxSegmenter::new()),
        }
    }
}

#[cfg(feature = "backend-tract")]
fn depth_runner(preset: &PresetConfig, models_dir: &Path) -> Box<dyn DepthEstimator> {
    let path = models_dir.join(format!("{}.onnx", preset.midas_model));
    match OnnxDepth::load(&path, preset.midas_model) {
        Ok(runner) => Box::new(runner),
        Err(e) => {
            log::warn!("depth estimation unavailable: {}", e);
            Box::new(UnavailableRunner::new(e.to_string()))
        }
    }
}

#[cfg(not(feature = "backend-tract"))]
fn depth_runner(_preset: &PresetConfig, _models_dir: &Path) -> Box<dyn DepthEstimator> {
    Box::new(UnavailableRunner::new(
        "depth estimation requires the backend-tract feature",
    ))
}

#[cfg(feature = "backend-tract")]
fn detector_runner(preset: &PresetConfig, models_dir: &Path) -> Box<dyn ObjectDetector> {
    let path = models_dir.join(format!("{}.onnx", preset.yolo_stem()));
    match OnnxDetector::load(&path) {
        Ok(runner) => Box::new(runner),
        Err(e) => {
            log::warn!("object detection unavailable: {}", e);
            Box::new(UnavailableRunner::new(e.to_string()))
        }
    }
}

#[cfg(not(feature = "backend-tract"))]
fn detector_runner(_preset: &PresetConfig, _models_dir: &Path) -> Box<dyn ObjectDetector> {
    Box::new(UnavailableRunner::new(
        "object detection requires the backend-tract feature",
    ))
}

#[derive(Serialize)]
struct DetectionRecord<'a> {
    class_id: i64,
    class: &'a str,
    bbox: BBox,
    confidence: f32,
}

/// Runs the perception stages over single images.
pub struct PerceptionAdapter {
    runners: PerceptionRunners,
}

impl PerceptionAdapter {
    pub fn new(runners: PerceptionRunners) -> Self {
        Self { runners }
    }

    /// `(stage, runner name, unavailable reason)` for each perception runner.
    pub fn runner_status(&self) -> [(&'static str, &'static str, Option<&str>); 3] {
        [
            (
                "depth estimation",
                self.runners.depth.name(),
                self.runners.depth.unavailable_reason(),
            ),
            (
                "object detection",
                self.runners.detector.name(),
                self.runners.detector.unavailable_reason(),
            ),
            (
                "segmentation",
                self.runners.segmenter.name(),
                self.runners.segmenter.unavailable_reason(),
            ),
        ]
    }

    /// Perceive `image_path`, writing artifacts into `out_dir`.
    ///
    /// Missing runners yield a placeholder record. Runtime failures of depth or detection
    /// are returned as `StageFailed`; a failed mask is dropped.
    pub fn perceive(
        &mut self,
        image_path: &Path,
        out_dir: &Path,
        preset: &PresetConfig,
        frame_id: &str,
    ) -> PipelineResult<SceneFrame> {
        let rgb = image::open(image_path)
            .map_err(|e| PipelineError::invalid_image(image_path, e.to_string()))?
            .to_rgb8();
        std::fs::create_dir_all(out_dir)?;
        let source = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_path.display().to_string());

        log::info!(
            "{}: perception (preset {}, depth {}, detector {}, segmenter {})",
            frame_id,
            preset.preset,
            self.runners.depth.name(),
            self.runners.detector.name(),
            self.runners.segmenter.name()
        );

        let depth = match self.runners.depth.estimate(&rgb) {
            Ok(depth) => depth,
            Err(RunnerError::Unavailable(reason)) => {
                return placeholder_frame(&rgb, out_dir, frame_id, source, &reason)
            }
            Err(RunnerError::Failed(detail)) => {
                return Err(PipelineError::stage_failed("depth estimation", detail))
            }
        };
        let detections = match self.runners.detector.detect(&rgb) {
            Ok(detections) => detections,
            Err(RunnerError::Unavailable(reason)) => {
                return placeholder_frame(&rgb, out_dir, frame_id, source, &reason)
            }
            Err(RunnerError::Failed(detail)) => {
                return Err(PipelineError::stage_failed("object detection", detail))
            }
        };

        let (width, height) = rgb.dimensions();
        let depth_path = format!("depth_{}.png", frame_id);
        let depth = if depth.dimensions() == (width, height) {
            depth
        } else {
            imageops::resize(&depth, width, height, FilterType::Triangle)
        };
        depth.save(out_dir.join(&depth_path))?;

        let named: Vec<(String, &RawDetection)> = detections
            .iter()
            .map(|d| (class_name(d.class_id), d))
            .collect();
        let records: Vec<DetectionRecord<'_>> = named
            .iter()
            .map(|(class, d)| DetectionRecord {
                class_id: d.class_id,
                class,
                bbox: d.bbox,
                confidence: d.confidence,
            })
            .collect();
        std::fs::write(
            out_dir.join(format!("detections_{}.json", frame_id)),
            serde_json::to_string_pretty(&records)?,
        )?;

        let mut extra = Map::new();
        let masks = self.segment_all(&rgb, out_dir, frame_id, &named, &mut extra);
        let bboxes = named
            .iter()
            .map(|(class, d)| BBoxEntry {
                class: class.clone(),
                bbox: d.bbox,
            })
            .collect();

        let frame = SceneFrame {
            id: frame_id.to_string(),
            source,
            width,
            height,
            depth_path,
            masks,
            bboxes,
            extra,
        };
        frame.validate()?;
        log::info!(
            "{}: {} detections, {} masks",
            frame_id,
            frame.bboxes.len(),
            frame.masks.len()
        );
        Ok(frame)
    }

    fn segment_all(
        &mut self,
        rgb: &RgbImage,
        out_dir: &Path,
        frame_id: &str,
        detections: &[(String, &RawDetection)],
        extra: &mut Map<String, Value>,
    ) -> Vec<MaskEntry> {
        let mut masks = Vec::new();
        if detections.is_empty() {
            return masks;
        }
        let mask_dir = out_dir.join("masks");
        if let Err(e) = std::fs::create_dir_all(&mask_dir) {
            log::warn!("{}: cannot create {}: {}", frame_id, mask_dir.display(), e);
            return masks;
        }

        let (width, height) = rgb.dimensions();
        for (index, (class, detection)) in detections.iter().enumerate() {
            let expanded = expand_bbox(detection.bbox, width, height);
            let mask = match self.runners.segmenter.segment(rgb, expanded) {
                Ok(mask) => mask,
                Err(RunnerError::Unavailable(reason)) => {
                    log::warn!("{}: segmentation unavailable: {}", frame_id, reason);
                    extra.insert("segmentation_unavailable".into(), Value::String(reason));
                    break;
                }
                Err(RunnerError::Failed(detail)) => {
                    log::warn!("{}: mask {} dropped: {}", frame_id, index + 1, detail);
                    continue;
                }
            };

            let file_name = format!("mask_{}_{:04}.png", class.replace(' ', "_"), index + 1);
            if let Err(e) = mask.save(mask_dir.join(&file_name)) {
                log::warn!("{}: mask {} not written: {}", frame_id, file_name, e);
                continue;
            }
            masks.push(MaskEntry {
                mask_path: format!("masks/{}", file_name),
                class: class.clone(),
                bbox: expanded,
            });
        }
        masks
    }
}

/// Minimal record for degraded mode; the source luma stands in for the depth map.
fn placeholder_frame(
    rgb: &RgbImage,
    out_dir: &Path,
    frame_id: &str,
    source: String,
    reason: &str,
) -> PipelineResult<SceneFrame> {
    log::warn!("{}: perception degraded to placeholder: {}", frame_id, reason);
    let depth_path = format!("depth_{}.png", frame_id);
    let luma: GrayImage = imageops::grayscale(rgb);
    luma.save(out_dir.join(&depth_path))?;

    let mut extra = Map::new();
    extra.insert("placeholder".into(), Value::Bool(true));
    extra.insert("reason".into(), Value::String(reason.to_string()));
    let frame = SceneFrame {
        id: frame_id.to_string(),
        source,
        width: rgb.width(),
        height: rgb.height(),
        depth_path,
        masks: Vec::new(),
        bboxes: Vec::new(),
        extra,
    };
    frame.validate()?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::resolve;
    use image::{Luma, Rgb};
    use std::path::PathBuf;

    struct FakeDepth {
        size: (u32, u32),
        fail: bool,
    }

    impl DepthEstimator for FakeDepth {
        fn name(&self) -> &'static str {
            "fake-depth"
        }

        fn estimate(&mut self, _image: &RgbImage) -> Result<GrayImage, RunnerError> {
            if self.fail {
                return Err(RunnerError::failed("out of memory"));
            }
            Ok(GrayImage::from_fn(self.size.0, self.size.1, |x, _| {
                Luma([(x * 10) as u8])
            }))
        }
    }

    struct FakeDetector(Vec<RawDetection>);

    impl ObjectDetector for FakeDetector {
        fn name(&self) -> &'static str {
            "fake-detector"
        }

        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<RawDetection>, RunnerError> {
            Ok(self.0.clone())
        }
    }

    struct FlakySegmenter {
        calls: usize,
    }

    impl Segmenter for FlakySegmenter {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn segment(&mut self, image: &RgbImage, bbox: BBox) -> Result<GrayImage, RunnerError> {
            self.calls += 1;
            if self.calls == 1 {
                return Err(RunnerError::failed("mask decoder crashed"));
            }
            BoxSegmenter::new().segment(image, bbox)
        }
    }

    fn room_image(dir: &Path) -> PathBuf {
        let path = dir.join("room.png");
        RgbImage::from_pixel(64, 48, Rgb([120, 110, 100]))
            .save(&path)
            .unwrap();
        path
    }

    fn detections() -> Vec<RawDetection> {
        vec![
            RawDetection {
                bbox: [10.0, 10.0, 30.0, 40.0],
                class_id: 57,
                confidence: 0.91,
            },
            RawDetection {
                bbox: [0.0, 0.0, 64.0, 20.0],
                class_id: 60,
                confidence: 0.72,
            },
            RawDetection {
                bbox: [40.0, 5.0, 50.0, 15.0],
                class_id: 99,
                confidence: 0.40,
            },
        ]
    }

    fn full_runners(segmenter: Box<dyn Segmenter>) -> PerceptionRunners {
        PerceptionRunners {
            depth: Box::new(FakeDepth {
                size: (16, 12),
                fail: false,
            }),
            detector: Box::new(FakeDetector(detections())),
            segmenter,
        }
    }

    #[test]
    fn degraded_mode_returns_placeholder_record() {
        let dir = tempfile::tempdir().unwrap();
        let image = room_image(dir.path());
        let out = dir.path().join("frames").join("frame_0001");
        let mut adapter = PerceptionAdapter::new(PerceptionRunners::unavailable("no models"));

        let frame = adapter
            .perceive(&image, &out, resolve("fast"), "frame_0001")
            .unwrap();
        assert!(frame.is_placeholder());
        assert!(frame.bboxes.is_empty() && frame.masks.is_empty());
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.source, "room.png");
        assert_eq!(frame.depth_path, "depth_frame_0001.png");
        assert!(out.join(&frame.depth_path).is_file());
    }

    #[test]
    fn undecodable_image_is_invalid_image() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("room.jpg");
        std::fs::write(&bogus, b"not an image").unwrap();
        let mut adapter = PerceptionAdapter::new(PerceptionRunners::unavailable("no models"));
        let err = adapter
            .perceive(&bogus, dir.path(), resolve("fast"), "frame_0001")
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage { .. }));
    }

    #[test]
    fn full_mode_normalizes_detections_and_masks() {
        let dir = tempfile::tempdir().unwrap();
        let image = room_image(dir.path());
        let out = dir.path().join("frame_0001");
        let mut adapter = PerceptionAdapter::new(full_runners(Box::new(BoxSegmenter::new())));

        let frame = adapter
            .perceive(&image, &out, resolve("balanced"), "frame_0001")
            .unwrap();
        assert!(!frame.is_placeholder());

        let classes: Vec<&str> = frame.bboxes.iter().map(|b| b.class.as_str()).collect();
        assert_eq!(classes, vec!["couch", "dining table", "obj_99"]);

        let mask_paths: Vec<&str> = frame.masks.iter().map(|m| m.mask_path.as_str()).collect();
        assert_eq!(
            mask_paths,
            vec![
                "masks/mask_couch_0001.png",
                "masks/mask_dining_table_0002.png",
                "masks/mask_obj_99_0003.png",
            ]
        );
        assert_eq!(frame.masks[0].bbox, [9.0, 8.5, 31.0, 41.5]);
        assert_eq!(frame.masks[1].bbox, [0.0, 0.0, 64.0, 21.0]);
        for mask in &frame.masks {
            assert!(out.join(&mask.mask_path).is_file());
        }

        let depth = image::open(out.join(&frame.depth_path)).unwrap();
        assert_eq!((depth.width(), depth.height()), (64, 48));
        assert!(out.join("detections_frame_0001.json").is_file());
    }

    #[test]
    fn failed_mask_keeps_detection_order_indices() {
        let dir = tempfile::tempdir().unwrap();
        let image = room_image(dir.path());
        let mut adapter =
            PerceptionAdapter::new(full_runners(Box::new(FlakySegmenter { calls: 0 })));

        let frame = adapter
            .perceive(&image, dir.path(), resolve("fast"), "frame_0002")
            .unwrap();
        assert_eq!(frame.bboxes.len(), 3);
        assert_eq!(frame.masks.len(), 2);
        assert_eq!(frame.masks[0].mask_path, "masks/mask_dining_table_0002.png");
        assert_eq!(frame.masks[1].mask_path, "masks/mask_obj_99_0003.png");
    }

    #[test]
    fn unavailable_segmenter_leaves_masks_empty() {
        let dir = tempfile::tempdir().unwrap();
        let image = room_image(dir.path());
        let mut adapter =
            PerceptionAdapter::new(full_runners(Box::new(UnavailableRunner::new("no sam"))));

        let frame = adapter
            .perceive(&image, dir.path(), resolve("fast"), "frame_0001")
            .unwrap();
        assert_eq!(frame.bboxes.len(), 3);
        assert!(frame.masks.is_empty());
        assert_eq!(frame.extra["segmentation_unavailable"], "no sam");
        assert!(!frame.is_placeholder());
    }

    #[test]
    fn depth_runtime_failure_is_stage_failure() {
        let dir = tempfile::tempdir().unwrap();
        let image = room_image(dir.path());
        let mut adapter = PerceptionAdapter::new(PerceptionRunners {
            depth: Box::new(FakeDepth {
                size: (64, 48),
                fail: true,
            }),
            detector: Box::new(FakeDetector(Vec::new())),
            segmenter: Box::new(BoxSegmenter::new()),
        });
        let err = adapter
            .perceive(&image, dir.path(), resolve("fast"), "frame_0001")
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StageFailed {
                stage: "depth estimation",
                ..
            }
        ));
    }
}
