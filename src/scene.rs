//! Scene records shared by every pipeline stage.
//!
//! - `SceneFrame`: normalized perception output for one image.
//! - `SceneManifest`: the document written to `scene/*.json`.
//! - `PromptScene`: the objects/brightness/depth-summary shape consumed by prompt synthesis.
//!
//! Every path stored in a `SceneFrame` is relative to that frame's artifact directory.
//! `validate` enforces this at the stage boundary so a malformed record fails where it
//! is produced, not three stages later.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path};

use crate::error::{PipelineError, PipelineResult};

/// Axis-aligned box in image pixels: `[x1, y1, x2, y2]`.
pub type BBox = [f64; 4];

/// Input kind of a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Image,
    Video,
}

impl RunMode {
    pub fn name(self) -> &'static str {
        match self {
            RunMode::Image => "image",
            RunMode::Video => "video",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One detected object, in detection order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBoxEntry {
    pub class: String,
    pub bbox: BBox,
}

/// One segmentation mask. `bbox` is the expanded, clamped box given to the segmenter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskEntry {
    pub mask_path: String,
    pub class: String,
    pub bbox: BBox,
}

/// Normalized perception output for a single image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneFrame {
    pub id: String,
    pub source: String,
    pub width: u32,
    pub height: u32,
    pub depth_path: String,
    #[serde(default)]
    pub masks: Vec<MaskEntry>,
    #[serde(default)]
    pub bboxes: Vec<BBoxEntry>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl SceneFrame {
    /// True when perception ran in degraded mode.
    pub fn is_placeholder(&self) -> bool {
        self.extra
            .get("placeholder")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.id.trim().is_empty() {
            return Err(PipelineError::InvalidRecord("frame id is empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::InvalidRecord(format!(
                "{}: image dimensions must be non-zero ({}x{})",
                self.id, self.width, self.height
            )));
        }
        if self.depth_path.is_empty() {
            return Err(PipelineError::InvalidRecord(format!(
                "{}: depth_path is empty",
                self.id
            )));
        }
        ensure_relative(&self.id, "depth_path", &self.depth_path)?;

        for entry in &self.bboxes {
            ensure_box(&self.id, &entry.bbox)?;
        }
        for mask in &self.masks {
            ensure_relative(&self.id, "mask_path", &mask.mask_path)?;
            ensure_box(&self.id, &mask.bbox)?;
            let [x1, y1, x2, y2] = mask.bbox;
            let (w, h) = (self.width as f64, self.height as f64);
            if x1 < 0.0 || y1 < 0.0 || x2 > w || y2 > h {
                return Err(PipelineError::InvalidRecord(format!(
                    "{}: mask box {:?} exceeds image bounds {}x{}",
                    self.id, mask.bbox, self.width, self.height
                )));
            }
        }
        Ok(())
    }
}

fn ensure_relative(id: &str, field: &str, value: &str) -> PipelineResult<()> {
    let path = Path::new(value);
    let escapes = path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if path.is_absolute() || escapes {
        return Err(PipelineError::InvalidRecord(format!(
            "{}: {} must be relative to the frame directory, got {}",
            id, field, value
        )));
    }
    Ok(())
}

fn ensure_box(id: &str, bbox: &BBox) -> PipelineResult<()> {
    let [x1, y1, x2, y2] = *bbox;
    if bbox.iter().any(|v| !v.is_finite()) || x1 > x2 || y1 > y2 {
        return Err(PipelineError::InvalidRecord(format!(
            "{}: malformed box {:?}",
            id, bbox
        )));
    }
    Ok(())
}

/// Document written for one frame (`scene/frame_NNNN.json`) or the whole run (`scene/scene.json`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub frames: Vec<SceneFrame>,
    pub preset: String,
    pub mode: RunMode,
}

impl SceneManifest {
    pub fn new(frames: Vec<SceneFrame>, preset: &str, mode: RunMode) -> Self {
        Self {
            frames,
            preset: preset.to_string(),
            mode,
        }
    }

    /// Write the manifest, replacing any previous file.
    pub fn write(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read and validate a manifest.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: SceneManifest = serde_json::from_str(&raw)?;
        for frame in &manifest.frames {
            frame.validate()?;
        }
        Ok(manifest)
    }
}

/// Object entry of the prompt scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneObject {
    pub label: String,
    pub bbox: Vec<f64>,
    pub confidence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessMetadata {
    pub is_dark: bool,
    pub average_brightness: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthSummary {
    pub variance: f64,
    pub min_depth: f64,
    pub max_depth: f64,
}

/// Mean luma below which a room counts as dark.
pub const DARK_LUMA_THRESHOLD: f64 = 85.0;

const DETECTION_CONFIDENCE: f64 = 0.9;

/// Scene shape read by auto-design prompt synthesis.
///
/// Missing sections deserialize to their defaults (no objects, not dark, zero variance).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptScene {
    pub objects: Vec<SceneObject>,
    pub brightness_metadata: BrightnessMetadata,
    pub depth_summary: DepthSummary,
}

impl PromptScene {
    /// Adapt a scene frame. Mask classes already present among the detections are not repeated.
    pub fn from_frame(frame: &SceneFrame, average_brightness: Option<f64>) -> Self {
        let mut objects: Vec<SceneObject> = frame
            .bboxes
            .iter()
            .map(|entry| SceneObject {
                label: entry.class.clone(),
                bbox: entry.bbox.to_vec(),
                confidence: DETECTION_CONFIDENCE,
            })
            .collect();
        for mask in &frame.masks {
            if !objects.iter().any(|o| o.label == mask.class) {
                objects.push(SceneObject {
                    label: mask.class.clone(),
                    bbox: mask.bbox.to_vec(),
                    confidence: DETECTION_CONFIDENCE,
                });
            }
        }

        let average_brightness = average_brightness.unwrap_or(128.0);
        Self {
            objects,
            brightness_metadata: BrightnessMetadata {
                is_dark: average_brightness < DARK_LUMA_THRESHOLD,
                average_brightness,
            },
            depth_summary: DepthSummary {
                variance: 1.0,
                min_depth: 0.0,
                max_depth: 1.0,
            },
        }
    }
}
